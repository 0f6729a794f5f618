//! Recipe provider clients.
//!
//! A provider serves pages of raw recipe payloads. Payloads are passed on
//! untouched; [`larder_core::normalize`] turns them into recipes.

mod spoonacular;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use spoonacular::SpoonacularClient;

/// Errors that can occur when fetching from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Daily quota used up (HTTP 402).
    #[error("Provider quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Rate limited by the provider.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Any other non-success status.
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// One page of provider results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderPage {
    /// Raw recipe payloads, in provider order.
    pub items: Vec<Value>,
    /// The provider's total result count, when reported.
    pub total_available: Option<u64>,
}

/// A paged source of raw recipe payloads.
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    /// Fetch `page_size` results starting at `offset`.
    async fn fetch_page(&self, offset: u64, page_size: u64) -> Result<ProviderPage, ProviderError>;
}

#[async_trait]
impl<P: RecipeProvider + ?Sized> RecipeProvider for std::sync::Arc<P> {
    async fn fetch_page(&self, offset: u64, page_size: u64) -> Result<ProviderPage, ProviderError> {
        (**self).fetch_page(offset, page_size).await
    }
}
