//! Store statistics command.

use std::time::Duration;

use larder_server::config::StoreConfig;
use larder_server::search::SearchService;
use larder_server::store;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreConfig::from_env()?;
    let store = store::open(&config).await?;
    let search = SearchService::new(store.clone(), Duration::from_secs(60));

    let result = search.nutrition_coverage().await;
    store.close().await;
    let coverage = result?;

    tracing::info!(
        total = coverage.total,
        has_calories = coverage.has_calories,
        has_protein = coverage.has_protein,
        has_carbs = coverage.has_carbs,
        has_fat = coverage.has_fat,
        "Recipe store stats"
    );
    Ok(())
}
