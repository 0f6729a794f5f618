//! Larder server - recipe search API.
//!
//! Serves the cached recipe catalog on port 3001.
//!
//! # Architecture
//!
//! - Axum web framework, JSON in and out
//! - `PostgreSQL` recipe store (or in-memory with `LARDER_STORE=memory`)
//! - Recipes are written only by `larder backfill`; this binary is read-only
//!   apart from creating the schema on startup

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use larder_server::config::ServerConfig;
use larder_server::state::AppState;
use larder_server::{routes, store, telemetry};
use tokio::signal;

#[tokio::main]
async fn main() {
    let config = ServerConfig::from_env().expect("Failed to load configuration");
    let _telemetry = telemetry::init("larder_server=info,tower_http=debug", &config.sentry);
    tracing::debug!(?config, "Configuration loaded");

    let store = store::open(&config.store)
        .await
        .expect("Failed to open recipe store");
    store
        .ensure_indexes()
        .await
        .expect("Failed to ensure recipe indexes");
    tracing::info!(backend = store.backend(), "Recipe store ready");

    let addr = config.socket_addr();
    let app = routes::app(AppState::new(config, Arc::clone(&store)))
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "larder listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // in-flight requests are done; release connections even if serve failed
    store.close().await;
    tracing::info!("Recipe store closed");

    served.expect("Server error");
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        tokio::select! {
            result = signal::ctrl_c() => result.expect("Failed to install Ctrl+C handler"),
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");

    tracing::info!("Shutdown signal received, draining connections");
}
