//! Recipe search, lookup and diagnostics handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use serde::{Deserialize, Deserializer, Serialize};

use larder_core::{ExternalId, FilterInput, FridgeMatcher, Recipe};

use crate::error::{AppError, Result, code};
use crate::search::{DEFAULT_LIMIT, NutritionCoverage, StoreStats};
use crate::state::AppState;
use crate::store::SearchPage;

/// Sample size of the debug endpoint.
const DEBUG_SAMPLE: usize = 1;

/// Body of `POST /api/recipes/search`.
///
/// Every field is optional and `null` counts as missing. An empty body is
/// the same as `{}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub filters: FilterInput,
    #[serde(deserialize_with = "null_as_default")]
    pub fridge_ingredients: Vec<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A recipe as returned by lookup, with `id` mirroring `externalId`.
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: ExternalId,
    #[serde(flatten)]
    pub recipe: Recipe,
}

/// Search cached recipes.
///
/// `limit` defaults to 24 and is clamped to the configured maximum page size.
pub async fn search(State(state): State<AppState>, body: Bytes) -> Result<Json<SearchPage>> {
    let request: SearchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SearchRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::BadRequest(e.to_string()))?
    };

    let offset = request.offset.unwrap_or(0);
    let limit = request
        .limit
        .unwrap_or(DEFAULT_LIMIT)
        .min(state.config().max_page_size);

    let page = state
        .search()
        .search(
            request.filters.into_filter(),
            FridgeMatcher::new(&request.fridge_ingredients),
            offset,
            limit,
        )
        .await
        .map_err(AppError::store(code::SEARCH_FAILED))?;

    Ok(Json(page))
}

/// Get one recipe by provider id.
///
/// Served through the lookup cache, so a backfill shows up here only after
/// `LARDER_RECIPE_CACHE_TTL_SECS`.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RecipeResponse>> {
    let not_found = || AppError::NotFound("Recipe".to_string());

    let id: ExternalId = id.parse().map_err(|_| not_found())?;
    let recipe = state
        .search()
        .get(id)
        .await
        .map_err(AppError::store(code::GET_FAILED))?
        .ok_or_else(not_found)?;

    Ok(Json(RecipeResponse {
        id: recipe.external_id,
        recipe,
    }))
}

/// Recipe count and a sample document.
pub async fn debug(State(state): State<AppState>) -> Result<Json<StoreStats>> {
    let stats = state
        .search()
        .stats(DEBUG_SAMPLE)
        .await
        .map_err(AppError::store(code::DEBUG_FAILED))?;
    Ok(Json(stats))
}

/// How many recipes carry each nutrition field.
pub async fn debug_nutrition(State(state): State<AppState>) -> Result<Json<NutritionCoverage>> {
    let coverage = state
        .search()
        .nutrition_coverage()
        .await
        .map_err(AppError::store(code::DEBUG_FAILED))?;
    Ok(Json(coverage))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_search_request_defaults() {
        let request: SearchRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(request.offset, None);
        assert_eq!(request.limit, None);
        assert!(request.fridge_ingredients.is_empty());
        assert_eq!(request.filters, FilterInput::default());
    }

    #[test]
    fn test_search_request_null_fields() {
        let request: SearchRequest = serde_json::from_value(json!({
            "filters": null,
            "fridgeIngredients": null,
            "offset": 24
        }))
        .unwrap();
        assert_eq!(request.offset, Some(24));
        assert!(request.fridge_ingredients.is_empty());
    }

    #[test]
    fn test_search_request_rejects_negative_offset() {
        let result = serde_json::from_value::<SearchRequest>(json!({ "offset": -1 }));
        assert!(result.is_err());
    }

    #[test]
    fn test_recipe_response_has_id() {
        let recipe: Recipe = serde_json::from_value(json!({
            "externalId": 9,
            "title": "Toast",
            "updatedAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        let value = serde_json::to_value(RecipeResponse {
            id: recipe.external_id,
            recipe,
        })
        .unwrap();
        assert_eq!(value["id"], json!(9));
        assert_eq!(value["externalId"], json!(9));
    }
}
