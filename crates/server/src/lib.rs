//! Larder server library.
//!
//! Recipe cache, search API and backfill driver. The binary in `main.rs`
//! serves the HTTP API; the `larder` CLI drives backfills and maintenance
//! through the same modules.
//!
//! # Architecture
//!
//! ```text
//! Backfill ──> RecipeProvider (Spoonacular) ──> normalize ──> RecipeStore
//! HTTP routes ──> SearchService ──> RecipeStore
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backfill;
pub mod config;
pub mod error;
pub mod provider;
pub mod routes;
pub mod search;
pub mod state;
pub mod store;
pub mod telemetry;
