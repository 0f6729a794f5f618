//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::search::SearchService;
use crate::store::RecipeStore;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The store handle is created by
/// the caller so its lifetime (and shutdown) stays with `main`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    search: SearchService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration
    /// * `store` - Opened recipe store
    #[must_use]
    pub fn new(config: ServerConfig, store: Arc<dyn RecipeStore>) -> Self {
        let search = SearchService::new(store, config.recipe_cache_ttl);
        Self {
            inner: Arc::new(AppStateInner { config, search }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the search service.
    #[must_use]
    pub fn search(&self) -> &SearchService {
        &self.inner.search
    }

    /// Get a reference to the recipe store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecipeStore> {
        self.inner.search.store()
    }
}
