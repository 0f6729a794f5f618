//! Backfill driver: copy the provider catalog into the recipe store.
//!
//! Pages are fetched sequentially, normalized, and upserted in batches. The
//! run stops on the first empty page, once the provider total is reached, or
//! at the safety cap. Re-running is safe: upserts are keyed on the provider
//! id, so an interrupted run is resumed by starting over.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use larder_core::{Recipe, normalize_at};

use crate::provider::{ProviderError, RecipeProvider};
use crate::store::{RecipeStore, StoreError};

/// Tuning knobs for a backfill run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillSettings {
    /// Recipes requested per provider page.
    pub page_size: u64,
    /// Recipes written per upsert call.
    pub batch_size: usize,
    /// Stop after this many recipes have been fetched.
    pub safety_cap: u64,
    /// Pause between provider pages.
    pub page_delay: Duration,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_size: 50,
            safety_cap: 10_000,
            page_delay: Duration::from_secs(1),
        }
    }
}

impl BackfillSettings {
    /// Check that every size is non-zero.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 {
            return Err("page size must be at least 1".to_string());
        }
        if self.batch_size == 0 {
            return Err("batch size must be at least 1".to_string());
        }
        if self.safety_cap == 0 {
            return Err("safety cap must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillPhase {
    Idle,
    Fetching { offset: u64 },
    Upserting { batch: usize },
    Done,
    Aborted,
}

impl fmt::Display for BackfillPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Fetching { offset } => write!(f, "fetching offset={offset}"),
            Self::Upserting { batch } => write!(f, "upserting batch={batch}"),
            Self::Done => f.write_str("done"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    /// Provider pages requested.
    pub pages: u64,
    /// Raw payloads received (after safety-cap truncation).
    pub fetched: u64,
    /// Recipes written to the store.
    pub upserted: u64,
    /// Payloads that could not be normalized.
    pub skipped: u64,
    /// Recipes the store rejected.
    pub failed: u64,
    pub phase: BackfillPhase,
}

impl Default for BackfillReport {
    fn default() -> Self {
        Self {
            pages: 0,
            fetched: 0,
            upserted: 0,
            skipped: 0,
            failed: 0,
            phase: BackfillPhase::Idle,
        }
    }
}

/// Errors that abort a backfill run.
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("invalid backfill settings: {0}")]
    Settings(String),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Drives one backfill run.
pub struct Backfill<P> {
    provider: P,
    store: Arc<dyn RecipeStore>,
    settings: BackfillSettings,
    report: BackfillReport,
    buffer: Vec<Recipe>,
}

impl<P: RecipeProvider> Backfill<P> {
    #[must_use]
    pub fn new(provider: P, store: Arc<dyn RecipeStore>, settings: BackfillSettings) -> Self {
        Self {
            provider,
            store,
            settings,
            report: BackfillReport::default(),
            buffer: Vec::new(),
        }
    }

    /// Run to completion.
    ///
    /// # Errors
    ///
    /// Returns `BackfillError` on the first provider or store failure. Recipes
    /// still buffered at that point are not written.
    #[instrument(skip(self), fields(page_size = self.settings.page_size, safety_cap = self.settings.safety_cap))]
    pub async fn run(mut self) -> Result<BackfillReport, BackfillError> {
        self.settings.validate().map_err(BackfillError::Settings)?;
        info!("Starting backfill");

        match self.fetch_all().await {
            Ok(()) => {
                self.transition(BackfillPhase::Done);
                let r = &self.report;
                info!(
                    pages = r.pages,
                    fetched = r.fetched,
                    upserted = r.upserted,
                    skipped = r.skipped,
                    failed = r.failed,
                    "Backfill complete"
                );
                Ok(self.report)
            }
            Err(e) => {
                self.transition(BackfillPhase::Aborted);
                let r = &self.report;
                warn!(
                    error = %e,
                    pages = r.pages,
                    fetched = r.fetched,
                    upserted = r.upserted,
                    buffered = self.buffer.len(),
                    "Backfill aborted"
                );
                Err(e)
            }
        }
    }

    async fn fetch_all(&mut self) -> Result<(), BackfillError> {
        let BackfillSettings {
            page_size,
            batch_size,
            safety_cap,
            page_delay,
        } = self.settings;

        let mut offset: u64 = 0;
        let mut total: Option<u64> = None;

        loop {
            self.transition(BackfillPhase::Fetching { offset });
            let page = self.provider.fetch_page(offset, page_size).await?;
            self.report.pages += 1;

            let page_len = page.items.len() as u64;
            let expected = *total.get_or_insert(page.total_available.unwrap_or(page_len));
            if page.items.is_empty() {
                info!(offset, "Provider returned an empty page");
                break;
            }

            let room = safety_cap.saturating_sub(self.report.fetched);
            let items = page
                .items
                .into_iter()
                .take(usize::try_from(room).unwrap_or(usize::MAX));

            let now = Utc::now();
            for raw in items {
                self.report.fetched += 1;
                match normalize_at(&raw, now) {
                    Ok(recipe) => self.buffer.push(recipe),
                    Err(e) => {
                        warn!(error = %e, "Skipping recipe that failed to normalize");
                        self.report.skipped += 1;
                    }
                }
            }

            if self.buffer.len() >= batch_size || offset + page_size >= expected {
                self.flush().await?;
            }

            offset += page_size;

            if self.report.fetched >= safety_cap {
                info!(safety_cap, "Reached safety cap");
                break;
            }
            if offset >= expected {
                break;
            }

            tokio::time::sleep(page_delay).await;
        }

        self.flush().await
    }

    /// Write everything buffered, `batch_size` recipes at a time.
    async fn flush(&mut self) -> Result<(), BackfillError> {
        let buffer = std::mem::take(&mut self.buffer);
        for batch in buffer.chunks(self.settings.batch_size) {
            self.transition(BackfillPhase::Upserting { batch: batch.len() });
            let outcome = self.store.upsert_many(batch).await?;
            self.report.upserted += outcome.upserted as u64;
            self.report.failed += outcome.failed() as u64;
        }
        Ok(())
    }

    fn transition(&mut self, phase: BackfillPhase) {
        info!(from = %self.report.phase, to = %phase, "Backfill phase");
        self.report.phase = phase;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;
    use crate::provider::ProviderPage;
    use crate::store::{MemoryRecipeStore, StorePredicate};

    /// Serves `total` synthetic recipes with ids `1..=total`.
    struct ScriptedProvider {
        total: u64,
        report_total: bool,
        fail_at: Option<u64>,
        malformed: Vec<u64>,
        requests: Mutex<Vec<u64>>,
    }

    impl ScriptedProvider {
        fn new(total: u64) -> Self {
            Self {
                total,
                report_total: true,
                fail_at: None,
                malformed: Vec::new(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<u64> {
            self.requests.lock().unwrap().clone()
        }

        fn payload(&self, id: u64) -> Value {
            if self.malformed.contains(&id) {
                return json!({ "id": id });
            }
            json!({
                "id": id,
                "title": format!("Recipe {id}"),
                "nutrition": { "nutrients": [{ "name": "Calories", "amount": 100 }] }
            })
        }
    }

    #[async_trait]
    impl RecipeProvider for ScriptedProvider {
        async fn fetch_page(&self, offset: u64, page_size: u64) -> Result<ProviderPage, ProviderError> {
            self.requests.lock().unwrap().push(offset);
            if self.fail_at == Some(offset) {
                return Err(ProviderError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            let end = (offset + page_size).min(self.total);
            let items = (offset + 1..=end).map(|id| self.payload(id)).collect();
            Ok(ProviderPage {
                items,
                total_available: self.report_total.then_some(self.total),
            })
        }
    }

    fn settings() -> BackfillSettings {
        BackfillSettings {
            page_size: 100,
            batch_size: 50,
            safety_cap: 10_000,
            page_delay: Duration::ZERO,
        }
    }

    async fn count(store: &Arc<dyn RecipeStore>) -> u64 {
        store.count_matching(StorePredicate::All).await.unwrap()
    }

    #[tokio::test]
    async fn test_stops_at_provider_total() {
        let provider = Arc::new(ScriptedProvider::new(250));
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());

        let report = Backfill::new(Arc::clone(&provider), Arc::clone(&store), settings())
            .run()
            .await
            .unwrap();

        assert_eq!(provider.requests(), vec![0, 100, 200]);
        assert_eq!(report.pages, 3);
        assert_eq!(report.fetched, 250);
        assert_eq!(report.upserted, 250);
        assert_eq!(report.phase, BackfillPhase::Done);
        assert_eq!(count(&store).await, 250);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());
        for _ in 0..2 {
            Backfill::new(ScriptedProvider::new(120), Arc::clone(&store), settings())
                .run()
                .await
                .unwrap();
        }
        assert_eq!(count(&store).await, 120);
    }

    #[tokio::test]
    async fn test_safety_cap_truncates_last_page() {
        let provider = Arc::new(ScriptedProvider::new(1_000));
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());
        let settings = BackfillSettings {
            safety_cap: 150,
            ..settings()
        };

        let report = Backfill::new(Arc::clone(&provider), Arc::clone(&store), settings)
            .run()
            .await
            .unwrap();

        assert_eq!(provider.requests(), vec![0, 100]);
        assert_eq!(report.fetched, 150);
        assert_eq!(count(&store).await, 150);
    }

    #[tokio::test]
    async fn test_empty_page_stops_when_total_unknown() {
        let provider = Arc::new(ScriptedProvider {
            report_total: false,
            ..ScriptedProvider::new(0)
        });
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());

        let report = Backfill::new(Arc::clone(&provider), store, settings())
            .run()
            .await
            .unwrap();

        assert_eq!(provider.requests(), vec![0]);
        assert_eq!(report.fetched, 0);
        assert_eq!(report.phase, BackfillPhase::Done);
    }

    #[tokio::test]
    async fn test_total_falls_back_to_first_page_length() {
        let provider = Arc::new(ScriptedProvider {
            report_total: false,
            ..ScriptedProvider::new(500)
        });
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());

        let report = Backfill::new(Arc::clone(&provider), store, settings())
            .run()
            .await
            .unwrap();

        assert_eq!(provider.requests(), vec![0]);
        assert_eq!(report.upserted, 100);
    }

    #[tokio::test]
    async fn test_small_pages_flush_remainder() {
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());
        let settings = BackfillSettings {
            page_size: 10,
            batch_size: 50,
            ..settings()
        };

        let report = Backfill::new(ScriptedProvider::new(35), Arc::clone(&store), settings)
            .run()
            .await
            .unwrap();

        assert_eq!(report.pages, 4);
        assert_eq!(report.upserted, 35);
        assert_eq!(count(&store).await, 35);
    }

    #[tokio::test]
    async fn test_malformed_recipes_are_skipped() {
        let provider = ScriptedProvider {
            malformed: vec![3, 7],
            ..ScriptedProvider::new(20)
        };
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());

        let report = Backfill::new(provider, Arc::clone(&store), settings())
            .run()
            .await
            .unwrap();

        assert_eq!(report.fetched, 20);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.upserted, 18);
    }

    #[tokio::test]
    async fn test_provider_error_aborts() {
        let provider = ScriptedProvider {
            fail_at: Some(100),
            ..ScriptedProvider::new(250)
        };
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());

        let result = Backfill::new(provider, Arc::clone(&store), settings())
            .run()
            .await;

        assert!(matches!(result, Err(BackfillError::Provider(_))));
        // the first page was already flushed
        assert_eq!(count(&store).await, 100);
    }

    #[tokio::test]
    async fn test_rejects_zero_sizes() {
        let store: Arc<dyn RecipeStore> = Arc::new(MemoryRecipeStore::new());
        let settings = BackfillSettings {
            batch_size: 0,
            ..settings()
        };
        let result = Backfill::new(ScriptedProvider::new(1), store, settings)
            .run()
            .await;
        assert!(matches!(result, Err(BackfillError::Settings(_))));
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(BackfillPhase::Fetching { offset: 200 }.to_string(), "fetching offset=200");
        assert_eq!(BackfillPhase::Done.to_string(), "done");
    }
}
