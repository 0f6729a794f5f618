//! Search service: the query side of the recipe cache.
//!
//! Wraps a [`RecipeStore`] with search logging, a lookup cache and the
//! diagnostics used by the debug endpoints.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tracing::{debug, info, instrument};

use larder_core::{ExternalId, FridgeMatcher, NutrientField, Recipe, RecipeFilter};

use crate::store::{RecipeQuery, RecipeStore, SearchPage, StoreError, StorePredicate};

/// Page size used when a request gives none.
pub const DEFAULT_LIMIT: usize = 24;

/// Recipe count plus a few example documents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total: u64,
    pub sample: Vec<Recipe>,
}

/// How many recipes have each nutrition field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionCoverage {
    pub total: u64,
    pub has_calories: u64,
    pub has_protein: u64,
    pub has_carbs: u64,
    pub has_fat: u64,
}

/// Search and lookup over cached recipes.
///
/// Cheap to clone. Looked-up recipes are cached for the configured TTL, so a
/// re-backfill reaches lookups only once the cached copy expires. A zero TTL
/// turns the cache off. Searches always read the store.
#[derive(Clone)]
pub struct SearchService {
    inner: Arc<SearchServiceInner>,
}

struct SearchServiceInner {
    store: Arc<dyn RecipeStore>,
    cache: Option<Cache<ExternalId, Recipe>>,
}

impl SearchService {
    #[must_use]
    pub fn new(store: Arc<dyn RecipeStore>, cache_ttl: Duration) -> Self {
        let cache = (!cache_ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1000)
                .time_to_live(cache_ttl)
                .build()
        });

        Self {
            inner: Arc::new(SearchServiceInner { store, cache }),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecipeStore> {
        &self.inner.store
    }

    /// Run a search.
    ///
    /// `limit` is used as given; callers facing untrusted input clamp it first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store query fails.
    #[instrument(skip_all, fields(offset = offset, limit = limit))]
    pub async fn search(
        &self,
        filter: RecipeFilter,
        fridge: FridgeMatcher,
        offset: usize,
        limit: usize,
    ) -> Result<SearchPage, StoreError> {
        info!(
            query = filter.query.as_deref(),
            cuisines = filter.cuisines.len(),
            diets = filter.diets.len(),
            intolerances = filter.intolerances.len(),
            price_buckets = filter.price_buckets.len(),
            fridge = fridge.items().len(),
            offset,
            limit,
            "Recipe search"
        );

        let query = RecipeQuery {
            filter,
            fridge,
            offset,
            limit,
        };
        let page = self.inner.store.search(&query).await?;

        info!(
            total_results = page.total_results,
            returned = page.results.len(),
            "Recipe search result"
        );
        Ok(page)
    }

    /// Look up one recipe by provider id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store lookup fails. Misses are not cached.
    #[instrument(skip(self))]
    pub async fn get(&self, id: ExternalId) -> Result<Option<Recipe>, StoreError> {
        let Some(cache) = &self.inner.cache else {
            return self.inner.store.find_by_id(id).await;
        };

        if let Some(recipe) = cache.get(&id).await {
            debug!("Recipe cache hit");
            return Ok(Some(recipe));
        }

        let recipe = self.inner.store.find_by_id(id).await?;
        if let Some(recipe) = &recipe {
            cache.insert(id, recipe.clone()).await;
        }
        Ok(recipe)
    }

    /// Total count plus `sample` example recipes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store query fails.
    pub async fn stats(&self, sample: usize) -> Result<StoreStats, StoreError> {
        let store = &self.inner.store;
        let total = store.count_matching(StorePredicate::All).await?;
        let sample = store.sample_matching(StorePredicate::All, sample).await?;
        Ok(StoreStats { total, sample })
    }

    /// Per-field nutrition coverage.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if any count fails.
    pub async fn nutrition_coverage(&self) -> Result<NutritionCoverage, StoreError> {
        Ok(NutritionCoverage {
            total: self.inner.store.count_matching(StorePredicate::All).await?,
            has_calories: self.count_with(NutrientField::Calories).await?,
            has_protein: self.count_with(NutrientField::Protein).await?,
            has_carbs: self.count_with(NutrientField::Carbs).await?,
            has_fat: self.count_with(NutrientField::Fat).await?,
        })
    }

    async fn count_with(&self, field: NutrientField) -> Result<u64, StoreError> {
        self.inner
            .store
            .count_matching(StorePredicate::HasNutrient(field))
            .await
    }
}
