//! Backfill command.
//!
//! # Environment Variables
//!
//! - `SPOONACULAR_KEY` - Provider API key (required)
//! - `LARDER_DATABASE_URL` - `PostgreSQL` connection string
//! - `BACKFILL_PAGE_SIZE`, `BACKFILL_BATCH_SIZE`, `BACKFILL_SAFETY_CAP`,
//!   `BACKFILL_PAGE_DELAY_MS` - Run settings, overridden by flags

use std::time::Duration;

use clap::Args;
use larder_server::backfill::{Backfill, BackfillSettings};
use larder_server::config::BackfillConfig;
use larder_server::provider::SpoonacularClient;
use larder_server::store;

#[derive(Debug, Args)]
pub struct BackfillArgs {
    /// Recipes per provider request
    #[arg(long)]
    page_size: Option<u64>,

    /// Recipes per store write
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop after this many recipes
    #[arg(long)]
    safety_cap: Option<u64>,

    /// Pause between provider requests, in milliseconds
    #[arg(long)]
    page_delay_ms: Option<u64>,
}

impl BackfillArgs {
    fn apply(&self, settings: &mut BackfillSettings) {
        if let Some(page_size) = self.page_size {
            settings.page_size = page_size;
        }
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(safety_cap) = self.safety_cap {
            settings.safety_cap = safety_cap;
        }
        if let Some(ms) = self.page_delay_ms {
            settings.page_delay = Duration::from_millis(ms);
        }
    }
}

/// Run one backfill to completion.
pub async fn run(args: BackfillArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = BackfillConfig::from_env()?;
    args.apply(&mut config.settings);

    tracing::info!("Opening recipe store...");
    let store = store::open(&config.store).await?;
    store.ensure_indexes().await?;

    let provider = SpoonacularClient::new(&config.spoonacular);
    let result = Backfill::new(provider, store.clone(), config.settings)
        .run()
        .await;

    store.close().await;

    let report = result?;
    tracing::info!(
        pages = report.pages,
        fetched = report.fetched,
        upserted = report.upserted,
        skipped = report.skipped,
        failed = report.failed,
        "Backfill finished"
    );
    Ok(())
}
