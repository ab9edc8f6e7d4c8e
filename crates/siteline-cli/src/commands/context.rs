use anyhow::{Context, Result};
use siteline_application::Siteline;
use siteline_core::capability::{EnvironmentSnapshot, StaticCapabilities};
use siteline_core::delivery::{NoOpTransport, Transport};
use siteline_core::record::PageId;
use siteline_infrastructure::{ConfigService, FileBackend, SitelinePaths};
use siteline_interaction::HttpTransport;
use std::path::PathBuf;
use std::sync::Arc;

pub struct ContextOptions {
    pub config: Option<PathBuf>,
    pub store_dir: Option<PathBuf>,
    pub page: PageId,
    pub dry_run: bool,
}

/// Builds a context over the on-disk store.
///
/// `SITELINE_API_KEY`, when set, is sent as a bearer token.
pub fn build(options: ContextOptions) -> Result<Siteline> {
    let config = ConfigService::new(options.config)
        .load()
        .context("Failed to load configuration")?;

    let store_dir = match options.store_dir {
        Some(dir) => dir,
        None => SitelinePaths::store_dir()?,
    };
    let backend = FileBackend::new(&store_dir)
        .with_context(|| format!("Failed to open store at {}", store_dir.display()))?;
    tracing::debug!("[CLI] Using store at {}", store_dir.display());

    let transport: Arc<dyn Transport> = if options.dry_run {
        tracing::info!("[CLI] Dry run: sends are accepted locally");
        Arc::new(NoOpTransport)
    } else {
        Arc::new(HttpTransport::new().with_api_key(std::env::var("SITELINE_API_KEY").ok()))
    };

    Siteline::builder(config)
        .backend(Arc::new(backend))
        .transport(transport)
        .capabilities(Arc::new(StaticCapabilities::new(cli_environment(
            options.page,
        ))))
        .build()
        .context("Invalid configuration")
}

/// What the CLI reports about itself in place of a browser.
pub fn cli_environment(page: PageId) -> EnvironmentSnapshot {
    EnvironmentSnapshot {
        user_agent: format!("siteline-cli/{}", env!("CARGO_PKG_VERSION")),
        page,
        language: std::env::var("LANG").unwrap_or_default(),
        timezone: chrono::Local::now().format("%:z").to_string(),
        ..Default::default()
    }
}
