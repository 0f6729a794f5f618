//! Spoonacular `complexSearch` client.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use super::{ProviderError, ProviderPage, RecipeProvider};
use crate::config::SpoonacularConfig;

/// Client for the Spoonacular recipe search API.
///
/// Every request asks for full recipe information, nutrition and ingredients
/// so a page can be normalized without follow-up calls. No retries: a failed
/// page fails the caller.
#[derive(Clone)]
pub struct SpoonacularClient {
    inner: Arc<SpoonacularClientInner>,
}

struct SpoonacularClientInner {
    client: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
}

impl std::fmt::Debug for SpoonacularClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpoonacularClient")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComplexSearchResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    total_results: Option<u64>,
}

impl SpoonacularClient {
    /// Create a new client.
    #[must_use]
    pub fn new(config: &SpoonacularConfig) -> Self {
        let mut endpoint = config.base_url.clone();
        endpoint.set_path("/recipes/complexSearch");

        Self {
            inner: Arc::new(SpoonacularClientInner {
                client: reqwest::Client::new(),
                endpoint,
                api_key: config.api_key.clone(),
            }),
        }
    }

    fn page_url(&self, offset: u64, page_size: u64) -> Url {
        let mut url = self.inner.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("apiKey", self.inner.api_key.expose_secret())
            .append_pair("number", &page_size.to_string())
            .append_pair("offset", &offset.to_string())
            .append_pair("addRecipeInformation", "true")
            .append_pair("addRecipeNutrition", "true")
            .append_pair("fillIngredients", "true");
        url
    }
}

#[async_trait]
impl RecipeProvider for SpoonacularClient {
    #[instrument(skip(self))]
    async fn fetch_page(&self, offset: u64, page_size: u64) -> Result<ProviderPage, ProviderError> {
        let response = self
            .inner
            .client
            .get(self.page_url(offset, page_size))
            .send()
            .await
            // the URL carries the API key
            .map_err(reqwest::Error::without_url)?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ProviderError::RateLimited(retry_after));
        }

        // read as text so error bodies can be reported even when they are not JSON
        let response_text = response.text().await.map_err(reqwest::Error::without_url)?;

        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            return Err(ProviderError::QuotaExhausted(truncate(&response_text, 200)));
        }

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %truncate(&response_text, 500),
                "Spoonacular returned non-success status"
            );
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate(&response_text, 200),
            });
        }

        let parsed: ComplexSearchResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %truncate(&response_text, 500),
                    "Failed to parse Spoonacular response"
                );
                return Err(ProviderError::Parse(e));
            }
        };

        debug!(
            returned = parsed.results.len(),
            total = ?parsed.total_results,
            "Fetched provider page"
        );

        Ok(ProviderPage {
            items: parsed.results,
            total_available: parsed.total_results,
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
