//! Core types for Larder.
//!
//! This module provides the canonical recipe document and its building blocks.

pub mod id;
pub mod price;
pub mod recipe;

pub use id::ExternalId;
pub use price::{Cents, PRICE_BUCKETS, PriceBucket};
pub use recipe::{Ingredient, NutrientField, Nutrition, Recipe};
