//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server errors are captured to
//! Sentry and logged before the response is built; clients get a JSON body
//! `{ "error": <code>, "message": <text> }` without internal details.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Error codes returned in the `error` field.
pub mod code {
    pub const DEBUG_FAILED: &str = "debug-failed";
    pub const SEARCH_FAILED: &str = "search-failed";
    pub const GET_FAILED: &str = "get-failed";
    pub const NOT_FOUND: &str = "not-found";
    pub const BAD_REQUEST: &str = "bad-request";
}

/// Application-level error type for the HTTP API.
#[derive(Debug, Error)]
pub enum AppError {
    /// A store operation failed while serving a request.
    #[error("{code}: {source}")]
    Store {
        code: &'static str,
        #[source]
        source: StoreError,
    },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Map a store error to a 500 carrying `code`.
    ///
    /// ```rust,ignore
    /// service.search(..).await.map_err(AppError::store(code::SEARCH_FAILED))?;
    /// ```
    pub fn store(code: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Store { code, source }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if matches!(self, Self::Store { .. }) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let (status, code, message) = match &self {
            Self::Store { code, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                *code,
                "Internal server error".to_string(),
            ),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, code::NOT_FOUND, format!("{what} not found")),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, code::BAD_REQUEST, msg.clone()),
        };

        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
