//! Provider payload normalization.
//!
//! Maps one raw recipe object from the provider's listing endpoint into a
//! [`Recipe`]. The provider has been observed to return nutrition in two
//! shapes:
//!
//! ```text
//! { "nutrition": { "nutrients": [ { "name": "Calories", "amount": 512.3 }, ... ] } }
//! { "nutrients": [ { "name": "Calories", "amount": 512.3 }, ... ] }
//! ```
//!
//! Anything else that claims to carry nutrition is rejected rather than
//! stored with empty nutrition.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{Cents, ExternalId, Ingredient, NutrientField, Nutrition, Recipe};

/// Errors produced while normalizing a provider recipe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The payload is not a JSON object.
    #[error("recipe payload is not an object")]
    NotAnObject,

    /// The payload has no integer `id`.
    #[error("recipe payload has no integer id")]
    MissingId,

    /// The payload has no string `title`.
    #[error("recipe {0} has no title")]
    MissingTitle(ExternalId),

    /// Nutrition is present in a shape we do not know how to read.
    #[error("recipe {id} has unrecognized nutrition shape: {detail}")]
    UnrecognizedNutrition { id: ExternalId, detail: String },
}

/// Where a payload's nutrient list lives.
#[derive(Debug, Clone, PartialEq)]
pub enum NutrientSource<'a> {
    /// `nutrition.nutrients`
    Nested(&'a [Value]),
    /// top-level `nutrients`
    Flat(&'a [Value]),
    /// No nutrition reported.
    Absent,
}

impl<'a> NutrientSource<'a> {
    /// Classify a payload's nutrition shape.
    ///
    /// `nutrition` takes precedence over a top-level `nutrients` list.
    ///
    /// # Errors
    ///
    /// Returns a description of the shape when neither known form applies.
    pub fn detect(fields: &'a Map<String, Value>) -> Result<Self, String> {
        match fields.get("nutrition") {
            None | Some(Value::Null) => {}
            Some(Value::Object(nutrition)) => {
                return match nutrition.get("nutrients") {
                    Some(Value::Array(list)) => Ok(Self::Nested(list)),
                    Some(other) => Err(format!(
                        "nutrition.nutrients is {}, expected an array",
                        kind(other)
                    )),
                    None => Err("nutrition object has no nutrients list".to_string()),
                };
            }
            Some(other) => {
                return Err(format!("nutrition is {}, expected an object", kind(other)));
            }
        }

        match fields.get("nutrients") {
            None | Some(Value::Null) => Ok(Self::Absent),
            Some(Value::Array(list)) => Ok(Self::Flat(list)),
            Some(other) => Err(format!("nutrients is {}, expected an array", kind(other))),
        }
    }

    /// The nutrient entries, empty when absent.
    #[must_use]
    pub const fn nutrients(&self) -> &'a [Value] {
        match self {
            Self::Nested(list) | Self::Flat(list) => *list,
            Self::Absent => &[],
        }
    }

    /// Amount of the first nutrient whose name contains `needle` (case-insensitive).
    #[must_use]
    pub fn find(&self, needle: &str) -> Option<f64> {
        let needle = needle.to_lowercase();
        self.nutrients()
            .iter()
            .find(|n| {
                n.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .and_then(|n| n.get("amount"))
            .and_then(finite_number)
    }

    /// Extract the tracked nutrition fields.
    #[must_use]
    pub fn nutrition(&self) -> Nutrition {
        let mut nutrition = Nutrition::default();
        for field in NutrientField::ALL {
            let amount = field
                .provider_names()
                .iter()
                .find_map(|name| self.find(name));
            nutrition.set(field, amount);
        }
        nutrition
    }
}

/// Normalize a raw provider recipe, stamping it with the current time.
///
/// # Errors
///
/// See [`normalize_at`].
pub fn normalize(raw: &Value) -> Result<Recipe, NormalizeError> {
    normalize_at(raw, Utc::now())
}

/// Normalize a raw provider recipe with an explicit `updatedAt`.
///
/// # Errors
///
/// Returns `NormalizeError` if the payload has no id or title, or if its
/// nutrition is in an unrecognized shape.
pub fn normalize_at(raw: &Value, updated_at: DateTime<Utc>) -> Result<Recipe, NormalizeError> {
    let fields = raw.as_object().ok_or(NormalizeError::NotAnObject)?;

    let external_id = fields
        .get("id")
        .and_then(Value::as_i64)
        .map(ExternalId::new)
        .ok_or(NormalizeError::MissingId)?;

    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .ok_or(NormalizeError::MissingTitle(external_id))?
        .to_string();

    let nutrition = NutrientSource::detect(fields)
        .map_err(|detail| NormalizeError::UnrecognizedNutrition {
            id: external_id,
            detail,
        })?
        .nutrition();

    let extended_ingredients = fields
        .get("extendedIngredients")
        .and_then(Value::as_array)
        .map(|list| list.iter().cloned().map(Ingredient::new).collect())
        .unwrap_or_default();

    let score = fields
        .get("spoonacularScore")
        .and_then(finite_number)
        .or_else(|| fields.get("aggregateLikes").and_then(finite_number));

    Ok(Recipe {
        external_id,
        title,
        image: fields.get("image").and_then(Value::as_str).map(String::from),
        extended_ingredients,
        ready_in_minutes: small_int(fields.get("readyInMinutes")),
        servings: small_int(fields.get("servings")),
        price_per_serving: fields
            .get("pricePerServing")
            .and_then(finite_number)
            .and_then(Cents::from_fractional_cents),
        nutrition,
        diets: string_list(fields.get("diets")),
        cuisines: string_list(fields.get("cuisines")),
        intolerances: string_list(fields.get("intolerances")),
        score,
        updated_at,
    })
}

/// A finite number from a JSON number or numeric string.
fn finite_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[allow(clippy::cast_possible_truncation)] // range-checked
fn small_int(value: Option<&Value>) -> Option<i32> {
    let n = finite_number(value?)?.round();
    (n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX)).then_some(n as i32)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
