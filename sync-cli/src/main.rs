//! # sync-cli
//!
//! CLI tool for driving the offline-sync queue.
//!
//! ## Commands
//!
//! - `enqueue`: Queue a mutation (delivered right away when online)
//! - `drain`: Run one drain cycle
//! - `status`: Show queue and engine status
//! - `clear`: Drop every queued item
//! - `watch`: Run the trigger loop until Ctrl-C
//!
//! ## Example
//!
//! ```bash
//! # Queue progress while offline
//! sync-cli enqueue --type progress --endpoint /progress \
//!     --payload '{"lesson": 3, "lastModified": 1700000000000}' --offline
//!
//! # Inspect the queue
//! sync-cli status
//!
//! # Deliver everything
//! sync-cli drain
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use offline_sync_types::ItemType;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{clear, drain, enqueue, status, watch};
use config::Config;

/// CLI tool for driving the offline-sync queue.
#[derive(Parser, Debug)]
#[command(name = "sync-cli")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the queue and the default config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (default: <data-dir>/offline-sync.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (overrides RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue a mutation for delivery
    Enqueue {
        /// Item type: progress, achievement, settings or analytics
        #[arg(long = "type", short = 't')]
        item_type: ItemType,

        /// Endpoint path (joined onto delivery.base_url) or absolute URL
        #[arg(long, short)]
        endpoint: String,

        /// JSON payload (or use --file)
        #[arg(long, short, conflicts_with = "file")]
        payload: Option<String>,

        /// File containing the JSON payload
        #[arg(long, short, conflicts_with = "payload")]
        file: Option<PathBuf>,

        /// Queue only; skip the immediate delivery attempt
        #[arg(long)]
        offline: bool,
    },

    /// Deliver queued items
    Drain {
        /// Treat the network as unreachable
        #[arg(long)]
        offline: bool,
    },

    /// Show queue and engine status
    Status {
        /// Print status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop every queued item
    Clear,

    /// Run the trigger loop until Ctrl-C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    let config = Config::load(cli.config.as_deref(), &data_dir)?;

    match cli.command {
        Commands::Enqueue {
            item_type,
            endpoint,
            payload,
            file,
            offline,
        } => {
            let raw = if let Some(json) = payload {
                json
            } else if let Some(path) = file {
                tokio::fs::read_to_string(&path)
                    .await
                    .context("Failed to read payload file")?
            } else {
                anyhow::bail!("Must specify --payload or --file");
            };
            let payload = serde_json::from_str(&raw).context("Payload is not valid JSON")?;
            enqueue::run(&data_dir, &config, item_type, payload, &endpoint, !offline).await?;
        }
        Commands::Drain { offline } => {
            drain::run(&data_dir, &config, !offline).await?;
        }
        Commands::Status { json } => {
            status::run(&data_dir, &config, json).await?;
        }
        Commands::Clear => {
            clear::run(&data_dir, &config).await?;
        }
        Commands::Watch => {
            watch::run(&data_dir, &config).await?;
        }
    }

    Ok(())
}

/// Log to stderr so command output on stdout stays parseable.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory for sync-cli.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "offline-sync", "sync-cli")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
