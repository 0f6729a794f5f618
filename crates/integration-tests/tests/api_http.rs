//! Recipe API over a real socket.
//!
//! Each test serves the router on an ephemeral port with the fixture
//! in-memory store and talks to it with `reqwest`.

#![allow(clippy::unwrap_used)]

use larder_integration_tests::{fixture_store, spawn_server, test_app};
use larder_server::config::ServerConfig;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};

async fn base_url() -> String {
    let addr = spawn_server(test_app(fixture_store(), ServerConfig::default())).await;
    format!("http://{addr}")
}

#[tokio::test]
async fn test_health_over_http() {
    let base = base_url().await;
    let resp = Client::new()
        .get(format!("{base}/api/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_search_over_http_has_cors_header() {
    let base = base_url().await;
    let resp = Client::new()
        .post(format!("{base}/api/recipes/search"))
        .header("Origin", "http://localhost:5173")
        .json(&json!({
            "filters": { "diets": ["vegan"] },
            "fridgeIngredients": ["cucumber", "lettuce"]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");

    let page: Value = resp.json().await.unwrap();
    assert_eq!(page["totalResults"], 1);
    assert_eq!(page["results"][0]["title"], "Garden Salad");
    assert_eq!(page["results"][0]["matchCount"], 2);
}

#[tokio::test]
async fn test_lookup_over_http() {
    let base = base_url().await;
    let client = Client::new();

    let resp = client
        .get(format!("{base}/api/recipes/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let recipe: Value = resp.json().await.unwrap();
    assert_eq!(recipe["title"], "Tomato Basil Pasta");
    assert_eq!(recipe["pricePerServing"], 250);

    let resp = client
        .get(format!("{base}/api/recipes/404"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
