//! In-process recipe store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::instrument;

use larder_core::{ExternalId, Recipe};

use super::{
    RecipeHit, RecipeQuery, RecipeStore, SearchPage, StoreError, StorePredicate, UpsertReport,
    rank,
};

/// Recipes kept in a map ordered by external id.
///
/// Nothing is persisted; the store starts empty on every process start.
#[derive(Debug, Default)]
pub struct MemoryRecipeStore {
    recipes: RwLock<BTreeMap<ExternalId, Recipe>>,
}

impl MemoryRecipeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-loaded with `recipes`.
    #[must_use]
    pub fn with_recipes(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        let map = recipes.into_iter().map(|r| (r.external_id, r)).collect();
        Self {
            recipes: RwLock::new(map),
        }
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        Ok(())
    }

    #[instrument(skip_all, fields(count = recipes.len()))]
    async fn upsert_many(&self, recipes: &[Recipe]) -> Result<UpsertReport, StoreError> {
        let mut map = self.recipes.write().await;
        for recipe in recipes {
            map.insert(recipe.external_id, recipe.clone());
        }
        Ok(UpsertReport {
            upserted: recipes.len(),
            failures: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: ExternalId) -> Result<Option<Recipe>, StoreError> {
        Ok(self.recipes.read().await.get(&id).cloned())
    }

    async fn count_matching(&self, predicate: StorePredicate) -> Result<u64, StoreError> {
        let map = self.recipes.read().await;
        let count = map.values().filter(|r| predicate.matches(r)).count();
        Ok(count as u64)
    }

    async fn sample_matching(
        &self,
        predicate: StorePredicate,
        limit: usize,
    ) -> Result<Vec<Recipe>, StoreError> {
        let map = self.recipes.read().await;
        Ok(map
            .values()
            .filter(|r| predicate.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }

    #[instrument(skip_all, fields(offset = query.offset, limit = query.limit))]
    async fn search(&self, query: &RecipeQuery) -> Result<SearchPage, StoreError> {
        let map = self.recipes.read().await;
        let require_match = !query.fridge.is_empty();

        let mut hits: Vec<RecipeHit> = map
            .values()
            .filter(|r| query.filter.matches(r))
            .filter_map(|r| {
                let count = query.fridge.match_count(r);
                (!require_match || count > 0).then(|| RecipeHit::new(r.clone(), count))
            })
            .collect();
        drop(map);

        rank(&mut hits);
        let total_results = hits.len() as u64;
        let results = hits
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(SearchPage {
            results,
            total_results,
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use larder_core::{Cents, FridgeMatcher, Ingredient, NutrientField, Nutrition, RecipeFilter};

    use super::*;

    fn recipe(id: i64, title: &str, ingredients: &[&str]) -> Recipe {
        Recipe {
            external_id: ExternalId::new(id),
            title: title.to_string(),
            image: None,
            extended_ingredients: ingredients
                .iter()
                .map(|name| Ingredient::named(name))
                .collect(),
            ready_in_minutes: None,
            servings: None,
            price_per_serving: None,
            nutrition: Nutrition::default(),
            diets: Vec::new(),
            cuisines: Vec::new(),
            intolerances: Vec::new(),
            score: None,
            updated_at: Utc::now(),
        }
    }

    fn query(filter: RecipeFilter, fridge: &[&str], offset: usize, limit: usize) -> RecipeQuery {
        RecipeQuery {
            filter,
            fridge: FridgeMatcher::new(fridge),
            offset,
            limit,
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryRecipeStore::new();
        let batch = vec![recipe(1, "A", &[]), recipe(2, "B", &[])];

        store.upsert_many(&batch).await.unwrap();
        store.upsert_many(&batch).await.unwrap();

        assert_eq!(store.count_matching(StorePredicate::All).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_document() {
        let store = MemoryRecipeStore::new();
        let mut first = recipe(1, "Old", &[]);
        first.nutrition.fat = Some(10.0);
        store.upsert_many(&[first]).await.unwrap();

        store.upsert_many(&[recipe(1, "New", &[])]).await.unwrap();

        let stored = store.find_by_id(ExternalId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.title, "New");
        assert_eq!(stored.nutrition.fat, None);
    }

    #[tokio::test]
    async fn test_fridge_filters_and_ranks() {
        let store = MemoryRecipeStore::with_recipes([
            recipe(1, "Soup", &["Tomato Sauce", "water"]),
            recipe(2, "Salad", &["onion"]),
            recipe(3, "Pasta", &["tomato", "basil", "pasta"]),
        ]);

        let page = store
            .search(&query(RecipeFilter::default(), &["tomato", "basil"], 0, 10))
            .await
            .unwrap();

        let ids: Vec<i64> = page.results.iter().map(|h| h.id.as_i64()).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(page.total_results, 2);
        assert_eq!(page.results[0].match_count, 2);
    }

    #[tokio::test]
    async fn test_pagination_keeps_total() {
        let store = MemoryRecipeStore::with_recipes((1..=5).map(|i| recipe(i, "R", &[])));

        for (offset, limit, expected) in [(0, 2, 2), (4, 2, 1), (5, 2, 0), (9, 2, 0), (0, 0, 0)] {
            let page = store
                .search(&query(RecipeFilter::default(), &[], offset, limit))
                .await
                .unwrap();
            assert_eq!(page.total_results, 5);
            assert_eq!(page.results.len(), expected, "offset {offset} limit {limit}");
        }
    }

    #[tokio::test]
    async fn test_search_applies_filter() {
        let mut cheap = recipe(1, "Cheap", &[]);
        cheap.price_per_serving = Some(Cents::new(150));
        let mut pricey = recipe(2, "Pricey", &[]);
        pricey.price_per_serving = Some(Cents::new(1500));
        let store = MemoryRecipeStore::with_recipes([cheap, pricey]);

        let filter = RecipeFilter {
            price_buckets: vec![larder_core::PriceBucket::UnderTwo],
            ..RecipeFilter::default()
        };
        let page = store.search(&query(filter, &[], 0, 10)).await.unwrap();
        assert_eq!(page.total_results, 1);
        assert_eq!(page.results[0].id, ExternalId::new(1));
    }

    #[tokio::test]
    async fn test_nutrient_predicates() {
        let mut with_fat = recipe(2, "B", &[]);
        with_fat.nutrition.fat = Some(1.0);
        let store = MemoryRecipeStore::with_recipes([recipe(1, "A", &[]), with_fat]);

        let predicate = StorePredicate::HasNutrient(NutrientField::Fat);
        assert_eq!(store.count_matching(predicate).await.unwrap(), 1);

        let sample = store.sample_matching(StorePredicate::All, 1).await.unwrap();
        assert_eq!(sample.len(), 1);
        assert_eq!(sample[0].external_id, ExternalId::new(1));
    }
}
