//! Health check endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde_json::{Value, json};

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns `{"ok": true}` if the server is running. Does not check dependencies.
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the recipe store is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, backend = state.store().backend(), "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
