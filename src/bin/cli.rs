//! Ads Collector CLI
//!
//! Local execution entry point. For AWS Lambda, use `ads-collector-lambda`.

use std::path::PathBuf;

use ads_collector::{
    config::{self, Credentials},
    error::Result,
    pipeline,
    services::CursorStore,
    storage,
};
use chrono::Utc;
use clap::{Parser, Subcommand};

/// Ads Collector - incremental recent-search collection
#[derive(Parser, Debug)]
#[command(
    name = "ads-collector",
    version,
    about = "Collects ad posts from a recent-search endpoint"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect new results for the configured rules
    Collect {
        /// Use every rule and the production page size
        #[arg(long)]
        production: bool,
    },

    /// Flatten collected results into core and media tables
    Enrich {
        /// Read every collected file instead of the first three
        #[arg(long)]
        production: bool,
    },

    /// Validate configuration and credentials
    Validate,

    /// Show the stored cursors
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::load_config(&cli.config)?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Collect { production } => {
            let credentials = Credentials::from_env()?;
            let store = storage::open(&config.storage).await?;
            let summary = pipeline::run_collect(&config, &credentials, store, production).await?;
            log::info!(
                "Collected {} items from {} rules",
                summary.items_collected(),
                summary.rules_collected()
            );
        }

        Command::Enrich { production } => {
            let store = storage::open(&config.storage).await?;
            let summary =
                pipeline::run_enrich(&config, store, production, Utc::now().date_naive()).await?;
            log::info!("Core table written to {}", summary.core_key);
        }

        Command::Validate => {
            pipeline::run_validate(&config, Credentials::from_env())?;
            log::info!("All validations passed!");
        }

        Command::Info => {
            let window = config.collection.recency_window()?;
            let store = storage::open(&config.storage).await?;
            let cursor_store = CursorStore::new(store, &config.storage.raw_folder);
            let cursors = cursor_store.load().await?;
            log::info!("Cursor store: {}", cursor_store.location());

            if cursors.is_empty() {
                log::info!("No cursors recorded yet.");
            }
            let now = Utc::now();
            for (tag, record) in cursors.iter() {
                log::info!(
                    "{}: newest_id={} created_at={} collected={} ({})",
                    tag,
                    record.newest_id,
                    record.created_at,
                    record.collection_datetime,
                    if record.is_fresh(now, window) {
                        "fresh"
                    } else {
                        "stale"
                    }
                );
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
