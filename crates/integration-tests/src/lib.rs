//! Integration tests for Larder.
//!
//! # Running Tests
//!
//! ```bash
//! # Router and HTTP tests (in-memory store, no services needed)
//! cargo test -p larder-integration-tests
//!
//! # PostgreSQL store tests
//! TEST_DATABASE_URL=postgres://localhost/larder_test \
//!     cargo test -p larder-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `api_router` - Handlers driven through the router without a socket
//! - `api_http` - A real listener exercised with `reqwest`
//! - `postgres_store` - `PgRecipeStore` against a live database

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use larder_core::{Recipe, normalize};
use larder_server::config::ServerConfig;
use larder_server::routes;
use larder_server::state::AppState;
use larder_server::store::{MemoryRecipeStore, RecipeStore};
use serde_json::{Value, json};

/// Raw provider payloads used across tests.
///
/// | id | title               | price  | calories | notes                 |
/// |----|---------------------|--------|----------|-----------------------|
/// | 1  | Tomato Basil Pasta  | $2.50  | 520      | vegetarian, Italian   |
/// | 2  | Chicken Curry       | $4.50  | 710      | Indian, dairy         |
/// | 3  | Garden Salad        | $1.20  | 180      | vegan, flat nutrients |
/// | 4  | Steak Frites        | $12.00 | none     | French                |
#[must_use]
pub fn provider_payloads() -> Vec<Value> {
    vec![
        json!({
            "id": 1,
            "title": "Tomato Basil Pasta",
            "image": "https://img.example/1.jpg",
            "readyInMinutes": 25,
            "servings": 2,
            "pricePerServing": 250.4,
            "extendedIngredients": [
                { "name": "tomato", "amount": 3 },
                { "name": "basil" },
                { "name": "pasta" }
            ],
            "nutrition": { "nutrients": [
                { "name": "Calories", "amount": 520.0 },
                { "name": "Protein", "amount": 18.0 },
                { "name": "Carbohydrates", "amount": 80.0 },
                { "name": "Fat", "amount": 12.0 }
            ]},
            "diets": ["vegetarian"],
            "cuisines": ["Italian"],
            "spoonacularScore": 88.0
        }),
        json!({
            "id": 2,
            "title": "Chicken Curry",
            "pricePerServing": 450,
            "extendedIngredients": [
                { "name": "chicken thigh" },
                { "name": "onion" },
                { "name": "tomato paste" },
                { "name": "cream" }
            ],
            "nutrition": { "nutrients": [
                { "name": "Calories", "amount": 710.0 },
                { "name": "Protein", "amount": 42.0 }
            ]},
            "cuisines": ["Indian"],
            "intolerances": ["dairy"]
        }),
        json!({
            "id": 3,
            "title": "Garden Salad",
            "pricePerServing": 120,
            "extendedIngredients": [
                { "name": "lettuce" },
                { "name": "cucumber" },
                { "name": "cherry tomatoes" }
            ],
            "nutrients": [
                { "name": "Calories", "amount": 180.0 },
                { "name": "Fat", "amount": 9.0 }
            ],
            "diets": ["vegan", "vegetarian"]
        }),
        json!({
            "id": 4,
            "title": "Steak Frites",
            "pricePerServing": 1200,
            "extendedIngredients": [
                { "name": "beef steak" },
                { "name": "potato" }
            ],
            "cuisines": ["French"]
        }),
    ]
}

/// The fixture payloads, normalized.
///
/// # Panics
///
/// Panics if a fixture payload fails to normalize.
#[must_use]
#[allow(clippy::expect_used)]
pub fn fixture_recipes() -> Vec<Recipe> {
    provider_payloads()
        .iter()
        .map(|payload| normalize(payload).expect("fixture payload normalizes"))
        .collect()
}

/// An in-memory store seeded with [`fixture_recipes`].
#[must_use]
pub fn fixture_store() -> Arc<dyn RecipeStore> {
    Arc::new(MemoryRecipeStore::with_recipes(fixture_recipes()))
}

/// The full application router over `store`.
#[must_use]
pub fn test_app(store: Arc<dyn RecipeStore>, config: ServerConfig) -> Router {
    routes::app(AppState::new(config, store))
}

/// Serve `app` on an ephemeral local port and return its address.
///
/// # Panics
///
/// Panics if no local port can be bound.
#[allow(clippy::expect_used)]
pub async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}
