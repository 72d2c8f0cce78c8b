//! Tourlist CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tourlist::{
    error::Result,
    models::{CatalogCredentials, Config},
    pipeline::{self, CatalogTarget, PipelineContext, RunReport},
    services::{EventExtractor, FileFetcher, HttpCatalog, HttpFetcher, PageFetcher, RetryingFetcher},
    storage::{LocalStorage, RecordSink},
};

/// Tourlist - concert listing ETL and playlist sync
#[derive(Parser, Debug)]
#[command(
    name = "tourlist",
    version,
    about = "Scrapes a concert listing and syncs a touring-artist playlist"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Override the storage directory from the config
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract events and print them as JSON
    Extract {
        /// Read the listing from a saved HTML file instead of the network
        #[arg(long)]
        file: Option<PathBuf>,

        /// Reference date for year inference (default: today, venue time)
        #[arg(long)]
        reference: Option<NaiveDate>,
    },

    /// Run the ETL and publish to local storage
    Etl {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run the full pipeline including catalog resolution and playlist sync
    Sync {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Validate configuration
    Validate,

    /// Show the current dataset summary
    Info,
}

/// Initialize logging; `-v` wins over the configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn build_fetcher(config: &Config, file: Option<PathBuf>) -> Result<Box<dyn PageFetcher>> {
    Ok(match file {
        Some(path) => {
            log::info!("Reading listing from {}", path.display());
            Box::new(FileFetcher::new(path))
        }
        None => Box::new(RetryingFetcher::from_config(
            HttpFetcher::new(&config.fetch)?,
            &config.fetch,
        )),
    })
}

fn log_report(report: &RunReport) {
    log::info!(
        "{} dates, {} staging rows, {} artists, {} concerts ({} upcoming, {} rejected)",
        report.event_count,
        report.staging_rows,
        report.artists,
        report.concerts,
        report.upcoming,
        report.rejected
    );
    if report.receipt.unchanged {
        log::info!("Listing unchanged; storage not rewritten");
    } else {
        log::info!("Published to {}", report.receipt.location);
    }
    for name in &report.receipt.diff.added {
        log::info!("  + {}", name);
    }
    for name in &report.receipt.diff.removed {
        log::info!("  - {}", name);
    }
    if let Some(resolution) = &report.resolution {
        for name in &resolution.unresolved {
            log::warn!("Not in catalog: {}", name);
        }
        for (name, reason) in &resolution.failed {
            log::warn!("Lookup failed for {}: {}", name, reason);
        }
    }
    log::info!(
        "{} artist(s) with an upcoming show",
        report.index.with_future_shows().len()
    );
    if let Some(sync) = &report.sync {
        log::info!(
            "Playlist {}: {} tracks in {} batch(es)",
            sync.playlist_id,
            sync.tracks_added,
            sync.batches
        );
    }
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = Config::load(&cli.config);
    let configured_level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &configured_level);

    let mut config = match loaded {
        Ok(config) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Err(e) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
    };
    if let Some(dir) = &cli.storage_dir {
        config.storage.dir = dir.display().to_string();
    }

    let storage = LocalStorage::from_config(&config.storage);

    match cli.command {
        Command::Extract { file, reference } => {
            let reference =
                reference.unwrap_or_else(|| config.extract.local_time(Utc::now()).date());
            let fetcher = build_fetcher(&config, file)?;
            let bytes = fetcher.fetch(&config.fetch.url).await?;
            let events = EventExtractor::new(reference).extract(&String::from_utf8_lossy(&bytes))?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }

        Command::Etl { file } => {
            config.validate()?;
            let fetcher = build_fetcher(&config, file)?;
            let ctx = PipelineContext {
                config: &config,
                fetcher: fetcher.as_ref(),
                sink: &storage,
                catalog: None,
            };
            let report = pipeline::run_pipeline(&ctx, Utc::now()).await?;
            log_report(&report);
        }

        Command::Sync { file } => {
            config.validate()?;
            let credentials = CatalogCredentials::from_env()?;
            let catalog = HttpCatalog::new(&config.catalog, &credentials)?;
            let fetcher = build_fetcher(&config, file)?;
            let ctx = PipelineContext {
                config: &config,
                fetcher: fetcher.as_ref(),
                sink: &storage,
                catalog: Some(CatalogTarget {
                    client: &catalog,
                    owner: credentials.username.clone(),
                }),
            };
            let report = pipeline::run_pipeline(&ctx, Utc::now()).await?;
            log_report(&report);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            match CatalogCredentials::from_env() {
                Ok(c) => log::info!("✓ Catalog credentials found for {}", c.username),
                Err(e) => log::warn!("Catalog credentials missing: {} (needed for sync)", e),
            }
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage.root().display());
            match storage.load_current().await? {
                Some(dataset) => {
                    log::info!("Current dataset: {}", dataset.run_at);
                    log::info!("Fingerprint: {}", dataset.fingerprint);
                    log::info!(
                        "{} staging rows, {} artists, {} concerts, {} upcoming, {} rejected",
                        dataset.staging.len(),
                        dataset.artists.len(),
                        dataset.concerts.len(),
                        dataset.upcoming.len(),
                        dataset.rejected.len()
                    );
                }
                None => log::info!("No dataset published yet."),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
