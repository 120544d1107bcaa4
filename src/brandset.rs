//! Brandset — the read-only catalog of ingredients and beverages.
//!
//! Every beverage is a recipe of ingredients, each with its own flow rate,
//! since micro pumps are variable rate and need per-ingredient rates.
//! The document shape matches the `brandset.json` the catalog is shipped in
//! (camelCase keys).

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Ingredient available to the dispenser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: String,
}

/// One ingredient's required flow rate within a beverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipePart {
    pub ingredient_id: String,
    /// Flow rate in mL/s.
    pub rate: f64,
}

impl RecipePart {
    pub fn new(ingredient_id: &str, rate: f64) -> Self {
        Self {
            ingredient_id: ingredient_id.into(),
            rate,
        }
    }
}

/// A pourable beverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beverage {
    pub id: String,
    pub name: String,
    /// Overall rate of the beverage (mL/s).
    #[serde(default)]
    pub rate: f64,
    pub recipe: Vec<RecipePart>,
}

/// Ingredients and beverages loaded from one catalog document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brandset {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub beverages: Vec<Beverage>,
}

impl Brandset {
    /// Parse and validate a catalog document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let brandset: Self = serde_json::from_str(json)?;
        brandset.validate()?;
        Ok(brandset)
    }

    pub fn beverage(&self, id: &str) -> Option<&Beverage> {
        self.beverages.iter().find(|b| b.id == id)
    }

    pub fn ingredient(&self, id: &str) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    /// Recipe of the beverage, or an empty slice for an unknown id.
    pub fn recipe_parts(&self, id: &str) -> &[RecipePart] {
        self.beverage(id).map_or(&[], |b| b.recipe.as_slice())
    }

    /// Ids must be unique and every recipe rate strictly positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, ing) in self.ingredients.iter().enumerate() {
            if self.ingredients[i + 1..].iter().any(|o| o.id == ing.id) {
                return Err(ConfigError::ValidationFailed("duplicate ingredient id"));
            }
        }
        for (i, bev) in self.beverages.iter().enumerate() {
            if self.beverages[i + 1..].iter().any(|o| o.id == bev.id) {
                return Err(ConfigError::ValidationFailed("duplicate beverage id"));
            }
            if bev
                .recipe
                .iter()
                .any(|part| !(part.rate.is_finite() && part.rate > 0.0))
            {
                return Err(ConfigError::ValidationFailed(
                    "recipe rates must be positive",
                ));
            }
        }
        Ok(())
    }
}
