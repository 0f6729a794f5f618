//! Schema command.
//!
//! Creates the `recipes` table and its search indexes. Safe to run repeatedly;
//! the server does the same on startup.
//!
//! # Environment Variables
//!
//! - `LARDER_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)

use larder_server::config::StoreConfig;
use larder_server::store;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreConfig::from_env()?;

    tracing::info!(backend = ?config.backend, "Connecting to recipe store...");
    let store = store::open(&config).await?;

    tracing::info!("Ensuring recipe schema...");
    let result = store.ensure_indexes().await;
    store.close().await;
    result?;

    tracing::info!("Recipe schema ready");
    Ok(())
}
