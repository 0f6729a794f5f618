//! "What's in my fridge" ingredient matching.

use crate::types::Recipe;

/// Counts how many of a recipe's ingredients the user already has.
///
/// An ingredient matches a fridge item when either name contains the other,
/// case-insensitively. Each ingredient counts at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FridgeMatcher {
    items: Vec<String>,
}

impl FridgeMatcher {
    /// Build a matcher from raw user input. Blank entries are dropped.
    #[must_use]
    pub fn new<S: AsRef<str>>(items: &[S]) -> Self {
        let items = items
            .iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { items }
    }

    /// True when no usable items were given.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Normalized fridge items.
    #[must_use]
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Whether one lower-cased ingredient name matches any fridge item.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.items
            .iter()
            .any(|item| name.contains(item.as_str()) || item.contains(name))
    }

    /// Number of the recipe's named ingredients that match.
    #[must_use]
    pub fn match_count(&self, recipe: &Recipe) -> usize {
        if self.is_empty() {
            return 0;
        }
        recipe
            .ingredient_names()
            .filter(|name| self.matches_name(name))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::types::{ExternalId, Ingredient, Nutrition};

    fn recipe_with(names: &[Option<&str>]) -> Recipe {
        Recipe {
            external_id: ExternalId::new(1),
            title: "Test".to_string(),
            image: None,
            extended_ingredients: names
                .iter()
                .map(|n| {
                    n.map_or_else(
                        || Ingredient::new(serde_json::json!({ "original": "a pinch" })),
                        Ingredient::named,
                    )
                })
                .collect(),
            ready_in_minutes: None,
            servings: None,
            price_per_serving: None,
            nutrition: Nutrition::default(),
            diets: Vec::new(),
            cuisines: Vec::new(),
            intolerances: Vec::new(),
            score: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_substring_either_direction() {
        let recipe = recipe_with(&[Some("tomato sauce"), Some("onion"), Some("basil")]);
        assert_eq!(FridgeMatcher::new(&["Tomato"]).match_count(&recipe), 1);
        assert_eq!(FridgeMatcher::new(&["red onion"]).match_count(&recipe), 1);
        assert_eq!(FridgeMatcher::new(&["tomato", "onion"]).match_count(&recipe), 2);
    }

    #[test]
    fn test_ingredient_counted_once() {
        let recipe = recipe_with(&[Some("cherry tomato")]);
        let matcher = FridgeMatcher::new(&["tomato", "cherry"]);
        assert_eq!(matcher.match_count(&recipe), 1);
    }

    #[test]
    fn test_duplicate_ingredients_each_count() {
        let recipe = recipe_with(&[Some("salt"), Some("salt")]);
        assert_eq!(FridgeMatcher::new(&["salt"]).match_count(&recipe), 2);
    }

    #[test]
    fn test_blank_entries_are_dropped() {
        let matcher = FridgeMatcher::new(&["  ", "", " Egg "]);
        assert_eq!(matcher.items(), ["egg".to_string()]);
        assert!(FridgeMatcher::new(&["", "   "]).is_empty());
    }

    #[test]
    fn test_nameless_ingredients_never_match() {
        let recipe = recipe_with(&[None, Some(""), Some("egg")]);
        assert_eq!(FridgeMatcher::new(&["egg"]).match_count(&recipe), 1);
    }

    #[test]
    fn test_empty_matcher_counts_zero() {
        let recipe = recipe_with(&[Some("egg")]);
        assert_eq!(FridgeMatcher::default().match_count(&recipe), 0);
    }
}
