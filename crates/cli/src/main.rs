//! Larder CLI - recipe backfill and store management.
//!
//! # Usage
//!
//! ```bash
//! # Pull the provider catalog into the store
//! larder backfill
//!
//! # Smaller pages, no delay (local testing)
//! larder backfill --page-size 10 --safety-cap 50 --page-delay-ms 0
//!
//! # Create the recipe schema and indexes
//! larder migrate
//!
//! # Recipe count and nutrition coverage
//! larder stats
//! ```
//!
//! # Commands
//!
//! - `backfill` - Fetch provider pages and upsert them into the store
//! - `migrate` - Create the recipe table and indexes
//! - `stats` - Log store counts

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use larder_server::config::SentryConfig;
use larder_server::telemetry;

mod commands;

#[derive(Parser)]
#[command(name = "larder")]
#[command(author, version, about = "Larder CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the provider catalog and upsert it into the store
    Backfill(commands::backfill::BackfillArgs),
    /// Create the recipe schema and indexes
    Migrate,
    /// Show recipe count and nutrition coverage
    Stats,
}

#[tokio::main]
async fn main() {
    // Backfill failures are reported to Sentry like server errors
    let guard = telemetry::init("info", &SentryConfig::from_env());

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        // exit skips destructors; flush Sentry first
        drop(guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Backfill(args) => commands::backfill::run(args).await?,
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Stats => commands::stats::run().await?,
    }
    Ok(())
}
