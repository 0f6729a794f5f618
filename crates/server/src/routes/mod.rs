//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /api/health                  - Liveness check
//! GET  /api/health/ready            - Readiness check (store reachable)
//!
//! # Recipes
//! GET  /api/recipes/debug           - Recipe count and a sample document
//! GET  /api/recipes/debug/nutrition - Nutrition field coverage
//! POST /api/recipes/search          - Filtered, fridge-matched search
//! GET  /api/recipes/{id}            - Single recipe by provider id
//! ```

pub mod health;
pub mod recipes;

use axum::http::Method;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the health routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health::health))
        .route("/ready", get(health::readiness))
}

/// Create the recipe routes router.
pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/debug", get(recipes::debug))
        .route("/debug/nutrition", get(recipes::debug_nutrition))
        .route("/search", post(recipes::search))
        .route("/{id}", get(recipes::show))
}

/// Create all API routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/health", health_routes())
        .nest("/api/recipes", recipe_routes())
}

/// Build the complete application with state, CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::ServerConfig;
    use crate::store::MemoryRecipeStore;

    fn test_app() -> Router {
        let store = Arc::new(MemoryRecipeStore::new());
        app(AppState::new(ServerConfig::default(), store))
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value, serde_json::json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_readiness_with_memory_store() {
        let response = test_app()
            .oneshot(Request::get("/api/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_post() {
        let response = test_app()
            .oneshot(
                Request::options("/api/recipes/search")
                    .header("Origin", "http://localhost:5173")
                    .header("Access-Control-Request-Method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }
}
