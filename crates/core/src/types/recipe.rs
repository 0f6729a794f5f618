//! The canonical recipe document.
//!
//! One `Recipe` exists per provider recipe id. Documents are written only by
//! the backfill and are replaced wholesale on every re-backfill.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::ExternalId;
use super::price::Cents;

/// A cached recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    /// Provider recipe id (unique).
    pub external_id: ExternalId,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    /// Ingredients in provider order.
    #[serde(default)]
    pub extended_ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub ready_in_minutes: Option<i32>,
    #[serde(default)]
    pub servings: Option<i32>,
    #[serde(default)]
    pub price_per_serving: Option<Cents>,
    #[serde(default)]
    pub nutrition: Nutrition,
    #[serde(default)]
    pub diets: Vec<String>,
    #[serde(default)]
    pub cuisines: Vec<String>,
    #[serde(default)]
    pub intolerances: Vec<String>,
    /// Popularity signal (provider score or like count).
    #[serde(default)]
    pub score: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    /// Lower-cased names of all named ingredients, in order.
    ///
    /// Duplicates are kept so that per-ingredient match counts stay exact.
    pub fn ingredient_names(&self) -> impl Iterator<Item = String> + '_ {
        self.extended_ingredients
            .iter()
            .filter_map(Ingredient::normalized_name)
    }
}

/// One entry of `extendedIngredients`, kept exactly as the provider sent it.
///
/// Typed views (`id`, `name`, `original`) read from the raw value and return
/// `None` when the field is missing or has an unexpected type. Entries that
/// are not objects are kept too; they simply have no name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ingredient(Value);

impl Ingredient {
    #[must_use]
    pub const fn new(raw: Value) -> Self {
        Self(raw)
    }

    /// An ingredient carrying only a name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.to_string()));
        Self(Value::Object(fields))
    }

    /// The provider payload, unchanged.
    #[must_use]
    pub const fn raw(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.0.get("id").and_then(Value::as_i64)
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// The ingredient line as written in the recipe.
    #[must_use]
    pub fn original(&self) -> Option<&str> {
        self.0.get("original").and_then(Value::as_str)
    }

    /// Trimmed, lower-cased name, or `None` for nameless ingredients.
    #[must_use]
    pub fn normalized_name(&self) -> Option<String> {
        let name = self.name()?.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_lowercase())
        }
    }
}

impl From<Value> for Ingredient {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}

/// Per-serving macro nutrients.
///
/// Each field is either a finite number or absent; provider coverage is
/// incomplete so any subset may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrition {
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub protein: Option<f64>,
    #[serde(default)]
    pub carbs: Option<f64>,
    #[serde(default)]
    pub fat: Option<f64>,
}

impl Nutrition {
    /// Read one field.
    #[must_use]
    pub const fn get(&self, field: NutrientField) -> Option<f64> {
        match field {
            NutrientField::Calories => self.calories,
            NutrientField::Protein => self.protein,
            NutrientField::Carbs => self.carbs,
            NutrientField::Fat => self.fat,
        }
    }

    /// Write one field, dropping non-finite values.
    pub fn set(&mut self, field: NutrientField, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        match field {
            NutrientField::Calories => self.calories = value,
            NutrientField::Protein => self.protein = value,
            NutrientField::Carbs => self.carbs = value,
            NutrientField::Fat => self.fat = value,
        }
    }
}

/// The four tracked nutrition fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NutrientField {
    Calories,
    Protein,
    Carbs,
    Fat,
}

impl NutrientField {
    pub const ALL: [Self; 4] = [Self::Calories, Self::Protein, Self::Carbs, Self::Fat];

    /// Field name as used in documents and filters.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calories => "calories",
            Self::Protein => "protein",
            Self::Carbs => "carbs",
            Self::Fat => "fat",
        }
    }

    /// Provider nutrient names to look for, in priority order.
    #[must_use]
    pub const fn provider_names(self) -> &'static [&'static str] {
        match self {
            Self::Calories => &["calories"],
            Self::Protein => &["protein"],
            Self::Carbs => &["carbohydrates", "carbs"],
            Self::Fat => &["fat"],
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ingredient_typed_views() {
        let ingredient = Ingredient::new(json!({
            "id": 11529,
            "name": "tomato",
            "original": "2 ripe tomatoes",
            "aisle": "Produce",
            "amount": 2.0
        }));

        assert_eq!(ingredient.id(), Some(11529));
        assert_eq!(ingredient.name(), Some("tomato"));
        assert_eq!(ingredient.original(), Some("2 ripe tomatoes"));
        assert_eq!(ingredient.raw()["aisle"], json!("Produce"));
    }

    #[test]
    fn test_ingredient_round_trips_verbatim() {
        let raw = json!({
            "id": "11529",
            "name": "tomato",
            "original": null,
            "aisle": "Produce"
        });
        let ingredient: Ingredient = serde_json::from_value(raw.clone()).unwrap();

        // mistyped fields stay in the document but have no typed view
        assert_eq!(ingredient.id(), None);
        assert_eq!(ingredient.original(), None);
        assert_eq!(ingredient.name(), Some("tomato"));

        assert_eq!(serde_json::to_value(&ingredient).unwrap(), raw);
    }

    #[test]
    fn test_non_object_ingredient_is_kept_nameless() {
        let ingredient = Ingredient::new(json!("tomato"));
        assert_eq!(ingredient.name(), None);
        assert_eq!(ingredient.normalized_name(), None);
        assert_eq!(serde_json::to_value(&ingredient).unwrap(), json!("tomato"));
    }

    #[test]
    fn test_normalized_name_skips_blank() {
        assert_eq!(Ingredient::named("   ").normalized_name(), None);
        assert_eq!(
            Ingredient::named(" Tomato Sauce ").normalized_name().as_deref(),
            Some("tomato sauce")
        );
    }

    #[test]
    fn test_nutrition_set_drops_non_finite() {
        let mut nutrition = Nutrition::default();
        nutrition.set(NutrientField::Fat, Some(f64::NAN));
        nutrition.set(NutrientField::Protein, Some(12.5));
        assert_eq!(nutrition.fat, None);
        assert_eq!(nutrition.get(NutrientField::Protein), Some(12.5));
    }

    #[test]
    fn test_recipe_deserializes_with_defaults() {
        let recipe: Recipe = serde_json::from_value(json!({
            "externalId": 7,
            "title": "Toast",
            "updatedAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();

        assert!(recipe.extended_ingredients.is_empty());
        assert!(recipe.diets.is_empty());
        assert_eq!(recipe.nutrition, Nutrition::default());
    }
}
