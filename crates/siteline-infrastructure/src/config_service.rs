//! Configuration loading.
//!
//! Resolution order:
//! 1. TOML file (explicit path, or `~/.config/siteline/config.toml`)
//! 2. Built-in defaults when the file is missing
//! 3. `SITELINE_*` environment overrides on top

use crate::paths::SitelinePaths;
use siteline_core::config::SitelineConfig;
use siteline_core::error::{Result, SitelineError};
use std::fs;
use std::path::{Path, PathBuf};

pub struct ConfigService {
    path: Option<PathBuf>,
}

impl ConfigService {
    /// Creates a service reading `path`, or the default config file when `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Loads the configuration, applies environment overrides and validates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, if an
    /// override has an invalid value, or if the result fails validation.
    pub fn load(&self) -> Result<SitelineConfig> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => SitelinePaths::config_file()?,
        };

        let mut config = Self::load_file(&path)?;
        apply_overrides(&mut config, |name| std::env::var(name).ok())?;
        config.validate()?;

        tracing::info!(
            "[Config] Loaded configuration for site '{}' (batch every {} ms)",
            config.site,
            config.batch_interval_ms
        );
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<SitelineConfig> {
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(SitelineConfig::default()),
            Ok(content) => SitelineConfig::from_toml_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    "[Config] No config file at {}, using defaults",
                    path.display()
                );
                Ok(SitelineConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Applies `SITELINE_*` overrides read through `lookup`.
pub fn apply_overrides<F>(config: &mut SitelineConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(site) = lookup("SITELINE_SITE") {
        config.site = site;
    }
    if let Some(url) = lookup("SITELINE_SINGLE_SUBMIT_URL") {
        config.endpoints.single_submit_url = Some(url);
    }
    if let Some(url) = lookup("SITELINE_BATCH_URL") {
        config.endpoints.batch_url = Some(url);
    }
    if let Some(url) = lookup("SITELINE_ANALYTICS_URL") {
        config.endpoints.analytics_url = Some(url);
    }
    if let Some(value) = lookup("SITELINE_BATCH_INTERVAL_MS") {
        config.batch_interval_ms = parse_override("SITELINE_BATCH_INTERVAL_MS", &value)?;
    }
    if let Some(value) = lookup("SITELINE_SESSION_TIMEOUT_MS") {
        config.session_timeout_ms = parse_override("SITELINE_SESSION_TIMEOUT_MS", &value)?;
    }
    if let Some(value) = lookup("SITELINE_ANALYTICS_ENABLED") {
        config.analytics_enabled = parse_flag("SITELINE_ANALYTICS_ENABLED", &value)?;
    }
    if let Some(value) = lookup("SITELINE_EXTERNAL_SUBMISSION_ENABLED") {
        config.external_submission_enabled =
            parse_flag("SITELINE_EXTERNAL_SUBMISSION_ENABLED", &value)?;
    }
    if let Some(value) = lookup("SITELINE_PERFORMANCE_MONITORING_ENABLED") {
        config.performance_monitoring_enabled =
            parse_flag("SITELINE_PERFORMANCE_MONITORING_ENABLED", &value)?;
    }
    Ok(())
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SitelineError::config(format!("{} has invalid value '{}'", name, value)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(SitelineError::config(format!(
            "{} has invalid value '{}'",
            name, value
        ))),
    }
}
