//! Recipe search filters.
//!
//! Clients send filters in a loose JSON shape: numbers may arrive as strings,
//! nutrition ranges may be nested (`{"calories": {"min": 200}}`) or flat
//! (`{"minCalories": 200}`), and empty strings mean "not set". [`FilterInput`]
//! accepts all of that and [`FilterInput::into_filter`] produces the one
//! canonical [`RecipeFilter`] that store backends work with.
//!
//! Malformed values are never an error: a filter that cannot be read is
//! simply not applied.

mod lenient;

use serde::Deserialize;

use crate::types::{Cents, NutrientField, PriceBucket, Recipe};

/// An inclusive range where either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericRange<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T> Default for NumericRange<T> {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
        }
    }
}

impl<T: PartialOrd + Copy> NumericRange<T> {
    /// Create a range from optional bounds.
    #[must_use]
    pub const fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    /// True when neither side is constrained.
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Whether `value` satisfies the range.
    ///
    /// A missing value only satisfies an unbounded range.
    #[must_use]
    pub fn contains(&self, value: Option<T>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(value) = value else {
            return false;
        };
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// The canonical search filter.
///
/// Every category is optional; categories combine with AND. Within
/// `price_buckets` the selected bands combine with OR, and the continuous
/// `price` range is ANDed on top of the bucket selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    /// Free-text query against the title (trimmed, non-empty).
    pub query: Option<String>,
    /// Continuous price-per-serving range.
    pub price: NumericRange<Cents>,
    /// Selected price bands (deduplicated, wire order).
    pub price_buckets: Vec<PriceBucket>,
    pub calories: NumericRange<f64>,
    pub protein: NumericRange<f64>,
    pub carbs: NumericRange<f64>,
    pub fat: NumericRange<f64>,
    /// Recipe must carry at least one of these diets.
    pub diets: Vec<String>,
    /// Recipe must carry at least one of these cuisines.
    pub cuisines: Vec<String>,
    /// Recipe must carry none of these intolerances.
    pub intolerances: Vec<String>,
}

impl RecipeFilter {
    /// The range for one nutrition field.
    #[must_use]
    pub const fn nutrient(&self, field: NutrientField) -> &NumericRange<f64> {
        match field {
            NutrientField::Calories => &self.calories,
            NutrientField::Protein => &self.protein,
            NutrientField::Carbs => &self.carbs,
            NutrientField::Fat => &self.fat,
        }
    }

    /// Lower-cased words of the text query.
    ///
    /// Double quotes and leading `-` are search operators in full-text
    /// backends, so they are stripped and every word stays a plain term.
    #[must_use]
    pub fn query_terms(&self) -> Vec<String> {
        self.query
            .as_deref()
            .map(|q| q.split_whitespace().filter_map(plain_term).collect())
            .unwrap_or_default()
    }

    /// Evaluate the filter against a recipe.
    ///
    /// Text matching here is a plain case-insensitive substring test on the
    /// title for any query word; database backends use their own full-text
    /// search instead.
    #[must_use]
    pub fn matches(&self, recipe: &Recipe) -> bool {
        self.matches_text(&recipe.title)
            && self.matches_price(recipe.price_per_serving)
            && NutrientField::ALL
                .iter()
                .all(|&field| self.nutrient(field).contains(recipe.nutrition.get(field)))
            && (self.diets.is_empty() || intersects(&self.diets, &recipe.diets))
            && (self.cuisines.is_empty() || intersects(&self.cuisines, &recipe.cuisines))
            && !intersects(&self.intolerances, &recipe.intolerances)
    }

    fn matches_text(&self, title: &str) -> bool {
        let terms = self.query_terms();
        if terms.is_empty() {
            return true;
        }
        let title = title.to_lowercase();
        terms.iter().any(|term| title.contains(term.as_str()))
    }

    fn matches_price(&self, price: Option<Cents>) -> bool {
        if !self.price.contains(price) {
            return false;
        }
        if self.price_buckets.is_empty() {
            return true;
        }
        price.is_some_and(|p| self.price_buckets.iter().any(|b| b.contains(p)))
    }
}

fn plain_term(word: &str) -> Option<String> {
    let word: String = word.chars().filter(|&c| c != '"').collect();
    let word = word.trim_start_matches('-');
    (!word.is_empty()).then(|| word.to_lowercase())
}

fn intersects(wanted: &[String], have: &[String]) -> bool {
    wanted.iter().any(|w| have.contains(w))
}

/// Min/max pair as sent by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RangeInput {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Filters exactly as they arrive on the wire.
///
/// Prices are in dollars; nutrition ranges accept the nested and the flat
/// shape, nested winning per side when both are given.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterInput {
    #[serde(deserialize_with = "lenient::text")]
    pub query: Option<String>,
    #[serde(deserialize_with = "lenient::range")]
    pub price: Option<RangeInput>,
    #[serde(deserialize_with = "lenient::indices")]
    pub price_buckets: Vec<usize>,

    #[serde(deserialize_with = "lenient::range")]
    pub calories: Option<RangeInput>,
    #[serde(deserialize_with = "lenient::number")]
    pub min_calories: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub max_calories: Option<f64>,

    #[serde(deserialize_with = "lenient::range")]
    pub protein: Option<RangeInput>,
    #[serde(deserialize_with = "lenient::number")]
    pub min_protein: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub max_protein: Option<f64>,

    #[serde(deserialize_with = "lenient::range")]
    pub carbs: Option<RangeInput>,
    #[serde(deserialize_with = "lenient::number")]
    pub min_carbs: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub max_carbs: Option<f64>,

    #[serde(deserialize_with = "lenient::range")]
    pub fat: Option<RangeInput>,
    #[serde(deserialize_with = "lenient::number")]
    pub min_fat: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub max_fat: Option<f64>,

    #[serde(deserialize_with = "lenient::strings")]
    pub diets: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub cuisines: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub intolerances: Vec<String>,
}

impl FilterInput {
    /// Convert to the canonical filter.
    #[must_use]
    pub fn into_filter(self) -> RecipeFilter {
        let price = self.price.unwrap_or_default();
        let price = NumericRange::new(
            price.min.and_then(Cents::from_dollars),
            price.max.and_then(Cents::from_dollars),
        );

        let mut price_buckets: Vec<PriceBucket> = Vec::new();
        for bucket in self
            .price_buckets
            .iter()
            .filter_map(|&i| PriceBucket::from_index(i))
        {
            if !price_buckets.contains(&bucket) {
                price_buckets.push(bucket);
            }
        }

        RecipeFilter {
            query: self.query,
            price,
            price_buckets,
            calories: merge(self.calories, self.min_calories, self.max_calories),
            protein: merge(self.protein, self.min_protein, self.max_protein),
            carbs: merge(self.carbs, self.min_carbs, self.max_carbs),
            fat: merge(self.fat, self.min_fat, self.max_fat),
            diets: self.diets,
            cuisines: self.cuisines,
            intolerances: self.intolerances,
        }
    }
}

impl From<FilterInput> for RecipeFilter {
    fn from(input: FilterInput) -> Self {
        input.into_filter()
    }
}

fn merge(nested: Option<RangeInput>, flat_min: Option<f64>, flat_max: Option<f64>) -> NumericRange<f64> {
    let nested = nested.unwrap_or_default();
    NumericRange::new(nested.min.or(flat_min), nested.max.or(flat_max))
}
