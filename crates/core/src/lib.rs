//! Larder Core - Recipe domain library.
//!
//! This crate provides the recipe model shared by every Larder component:
//! - `server` - HTTP search API and the recipe store backends
//! - `cli` - Backfill and maintenance commands
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Store backends in other crates translate the same
//! [`RecipeFilter`] into their own query language, and the in-memory backend
//! evaluates it directly through [`RecipeFilter::matches`].
//!
//! # Modules
//!
//! - [`types`] - Recipe documents, nutrition, ids and price buckets
//! - [`normalize`] - Provider payload to [`Recipe`] conversion
//! - [`filter`] - Canonical search filter and its lenient wire adapter
//! - [`fridge`] - Fridge-ingredient matching

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod filter;
pub mod fridge;
pub mod normalize;
pub mod types;

pub use filter::{FilterInput, NumericRange, RecipeFilter};
pub use fridge::FridgeMatcher;
pub use normalize::{NormalizeError, NutrientSource, normalize, normalize_at};
pub use types::*;
