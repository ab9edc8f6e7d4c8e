//! Configuration model.
//!
//! Every field has a default so a partial TOML file (or none at all) yields a
//! usable configuration.

use crate::error::{Result, SitelineError};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 60 * 60 * 1000;
pub const DEFAULT_SESSION_TIMEOUT_MS: u64 = 30 * 60 * 1000;
pub const DEFAULT_MAX_STORAGE_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_STORAGE_PREFIX: &str = "siteline_";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SitelineConfig {
    /// Site name stamped on batch envelopes
    pub site: String,
    pub analytics_enabled: bool,
    pub performance_monitoring_enabled: bool,
    /// Recognized for compatibility; meta tag management lives outside this crate.
    pub seo_enabled: bool,
    /// Gates both the single-send and batch delivery paths
    pub external_submission_enabled: bool,
    pub endpoints: EndpointConfig,
    pub batch_interval_ms: u64,
    pub session_timeout_ms: u64,
    /// Largest serialized value the local store accepts
    pub max_storage_bytes: usize,
    pub storage_prefix: String,
    pub performance_thresholds: PerformanceThresholds,
    pub retry: RetryConfig,
}

impl Default for SitelineConfig {
    fn default() -> Self {
        Self {
            site: "siteline".to_string(),
            analytics_enabled: true,
            performance_monitoring_enabled: true,
            seo_enabled: false,
            external_submission_enabled: false,
            endpoints: EndpointConfig::default(),
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT_MS,
            max_storage_bytes: DEFAULT_MAX_STORAGE_BYTES,
            storage_prefix: DEFAULT_STORAGE_PREFIX.to_string(),
            performance_thresholds: PerformanceThresholds::default(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    pub single_submit_url: Option<String>,
    pub batch_url: Option<String>,
    pub analytics_url: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PerformanceThresholds {
    pub page_load_ms: f64,
    pub first_contentful_paint_ms: f64,
    pub largest_contentful_paint_ms: f64,
    pub first_input_delay_ms: f64,
    pub cumulative_layout_shift: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            page_load_ms: 3000.0,
            first_contentful_paint_ms: 1800.0,
            largest_contentful_paint_ms: 2500.0,
            first_input_delay_ms: 100.0,
            cumulative_layout_shift: 0.1,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive batch failures tolerated before cooling down; unset means unbounded
    pub max_attempts: Option<u32>,
}

impl SitelineConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::for_batch_interval(self.batch_interval())
            .with_max_attempts(self.retry.max_attempts)
    }

    /// Checks internal consistency.
    ///
    /// # Errors
    ///
    /// Returns `SitelineError::Config` for zero intervals, a zero storage cap,
    /// or an enabled delivery path without an endpoint.
    pub fn validate(&self) -> Result<()> {
        if self.batch_interval_ms == 0 {
            return Err(SitelineError::config("batch_interval_ms must be positive"));
        }
        if self.session_timeout_ms == 0 {
            return Err(SitelineError::config("session_timeout_ms must be positive"));
        }
        if self.max_storage_bytes == 0 {
            return Err(SitelineError::config("max_storage_bytes must be positive"));
        }
        if self.retry.max_attempts == Some(0) {
            return Err(SitelineError::config(
                "retry.max_attempts must be at least 1 when set",
            ));
        }
        if self.external_submission_enabled
            && self.endpoints.single_submit_url.is_none()
            && self.endpoints.batch_url.is_none()
        {
            return Err(SitelineError::config(
                "external submission is enabled but no submission endpoint is configured",
            ));
        }
        if self.analytics_enabled && self.endpoints.analytics_url.is_none() {
            tracing::debug!("[Config] analytics enabled without endpoint; events stay local");
        }
        Ok(())
    }
}
