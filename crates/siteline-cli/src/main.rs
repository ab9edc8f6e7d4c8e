use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "siteline")]
#[command(about = "Siteline CLI - record submissions and events, deliver them in batches", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/siteline/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store directory (default: ~/.local/share/siteline/store)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Page records are attributed to: a page id or a URL path such as /contact.html
    #[arg(long, global = true, default_value = "unknown")]
    page: String,

    /// Accept every send locally instead of contacting the collector
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a form submission (relayed immediately when delivery is enabled)
    Submit {
        /// Form field as key=value (repeatable)
        #[arg(short, long = "field", value_parser = commands::parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Record an analytics event
    Track {
        /// Category such as page_views, interactions or errors
        category: String,
        /// Event type stored on the record
        event_type: String,
        /// Event field as key=value (repeatable)
        #[arg(short, long = "field", value_parser = commands::parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Send the submission backlog now
    Flush,
    /// Show the persisted state
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Start a session with background batching until Ctrl-C
    Run {
        /// Stop after this many seconds
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Delete everything in the store (backlog, analytics, sessions, watermark)
    Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .init();

    let page = commands::page_arg(&cli.page);
    let siteline = commands::context::build(commands::context::ContextOptions {
        config: cli.config,
        store_dir: cli.store_dir,
        page: page.clone(),
        dry_run: cli.dry_run,
    })?;

    match cli.command {
        Commands::Submit { fields } => commands::record::submit(&siteline, page, fields).await?,
        Commands::Track {
            category,
            event_type,
            fields,
        } => commands::record::track(&siteline, &category, &event_type, fields).await?,
        Commands::Flush => commands::flush::run(&siteline).await?,
        Commands::Status { json } => commands::status::show(&siteline, json)?,
        Commands::Run { duration_secs } => commands::run::run(&siteline, duration_secs).await?,
        Commands::Purge => commands::purge::run(&siteline),
    }

    Ok(())
}
