//! # Permit Import CLI (`permit-import`)
//!
//! ## Usage
//!
//! ```bash
//! permit-import --config ./config/permits.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `permit-import init` | Create the SQLite database and run schema migrations |
//! | `permit-import import --town <town> <files>...` | Import files from one town |
//! | `permit-import search "<query>"` | Search imported permits |
//! | `permit-import stats` | Show counts per town |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use permit_import::{config, ingest, migrate, search, stats};

/// Permit Import: normalize municipal permit datasets into one store.
#[derive(Parser)]
#[command(
    name = "permit-import",
    about = "Import municipal zoning and permit datasets into one searchable store",
    version,
    long_about = "Reads town-specific KML, GeoJSON, and Shapefile exports, maps their attributes \
    to a canonical permit schema, keeps the categories of interest, normalizes geometry to 2-D \
    WGS84 multipolygons, and stores every record not seen before."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/permits.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it on an existing database changes nothing.
    Init,

    /// Import one or more files published by a town.
    ///
    /// Records already stored are skipped. Malformed records are reported
    /// and skipped; an unreadable file stops the run.
    Import {
        /// Town the files come from: `apex`, `cary`, or `morrisville`.
        #[arg(long)]
        town: String,

        /// Delete this town's stored permits before importing.
        #[arg(long)]
        truncate: bool,

        /// Delete every stored permit, from all towns, before importing.
        #[arg(long, conflicts_with = "truncate")]
        truncate_all: bool,

        /// Files to import, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Search imported permits by keyword.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show stored permit counts.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import {
            town,
            truncate,
            truncate_all,
            files,
        } => {
            ingest::run_import(&cfg, &town, truncate, truncate_all, &files).await?;
        }
        Commands::Search { query, limit } => {
            search::run_search(&cfg, &query, limit).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
