//! Recipe store: persistence and querying of cached recipes.
//!
//! [`RecipeStore`] is the seam between the search service / backfill driver
//! and the database. Two backends implement it:
//!
//! - [`PgRecipeStore`] - `PostgreSQL` via sqlx, used in production
//! - [`MemoryRecipeStore`] - in-process map, used by tests and local development
//!
//! Both apply the same [`RecipeFilter`] and [`FridgeMatcher`] semantics.
//! The handle is created once at process start with [`open`], shared as
//! `Arc<dyn RecipeStore>`, and closed explicitly on shutdown.

mod memory;
mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use larder_core::{ExternalId, FridgeMatcher, NutrientField, Recipe, RecipeFilter};

use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryRecipeStore;
pub use postgres::PgRecipeStore;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Store was configured without what it needs to connect.
    #[error("store misconfigured: {0}")]
    Misconfigured(String),
}

/// Which documents a diagnostic count or sample covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePredicate {
    All,
    /// Documents where the nutrition field is present.
    HasNutrient(NutrientField),
}

impl StorePredicate {
    #[must_use]
    pub const fn matches(self, recipe: &Recipe) -> bool {
        match self {
            Self::All => true,
            Self::HasNutrient(field) => recipe.nutrition.get(field).is_some(),
        }
    }
}

/// Outcome of a bulk upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    /// Documents inserted or replaced.
    pub upserted: usize,
    /// Documents the store rejected, with the reason.
    pub failures: Vec<UpsertFailure>,
}

impl UpsertReport {
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertFailure {
    pub external_id: ExternalId,
    pub error: String,
}

/// A fully resolved search request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeQuery {
    pub filter: RecipeFilter,
    pub fridge: FridgeMatcher,
    pub offset: usize,
    pub limit: usize,
}

/// A recipe in a search result, with how many fridge items it uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeHit {
    /// Same as `externalId`; clients key on `id`.
    pub id: ExternalId,
    #[serde(flatten)]
    pub recipe: Recipe,
    pub match_count: usize,
}

impl RecipeHit {
    #[must_use]
    pub const fn new(recipe: Recipe, match_count: usize) -> Self {
        Self {
            id: recipe.external_id,
            recipe,
            match_count,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub results: Vec<RecipeHit>,
    /// Size of the full filtered set, ignoring `offset` and `limit`.
    pub total_results: u64,
}

/// Persistence operations for cached recipes.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Create the schema and indexes if they do not exist. Idempotent.
    async fn ensure_indexes(&self) -> Result<(), StoreError>;

    /// Insert or replace each recipe, keyed by `external_id`.
    ///
    /// Individual rejections are collected in the report; only
    /// connection-level failures return `Err`.
    async fn upsert_many(&self, recipes: &[Recipe]) -> Result<UpsertReport, StoreError>;

    async fn find_by_id(&self, id: ExternalId) -> Result<Option<Recipe>, StoreError>;

    async fn count_matching(&self, predicate: StorePredicate) -> Result<u64, StoreError>;

    /// Up to `limit` documents matching the predicate, lowest id first.
    async fn sample_matching(
        &self,
        predicate: StorePredicate,
        limit: usize,
    ) -> Result<Vec<Recipe>, StoreError>;

    /// Run a filtered, fridge-matched, sorted and paginated search.
    async fn search(&self, query: &RecipeQuery) -> Result<SearchPage, StoreError>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release connections. The store must not be used afterwards.
    async fn close(&self);
}

/// Open the configured store.
///
/// # Errors
///
/// Returns `StoreError` if the database cannot be reached or the config has
/// no database URL for the Postgres backend.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn RecipeStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryRecipeStore::new())),
        StoreBackend::Postgres => {
            let url = config.database_url.as_ref().ok_or_else(|| {
                StoreError::Misconfigured("postgres backend needs a database URL".to_string())
            })?;
            let store = PgRecipeStore::connect(url).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Order hits by match count (descending), then external id (ascending).
pub(crate) fn rank(hits: &mut [RecipeHit]) {
    hits.sort_by(|a, b| {
        b.match_count
            .cmp(&a.match_count)
            .then_with(|| a.id.cmp(&b.id))
    });
}
