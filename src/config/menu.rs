//! Menu and topping catalogs.
//!
//! The raw `[menu]` section of config.toml is deserialized into [`MenuConfig`]
//! and then validated into an immutable [`MenuCatalog`] that the pricing engine
//! and the bot read from for the lifetime of the process.

use crate::errors::{Error, Result};
use crate::models::SurchargeClass;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;

/// Raw `[menu]` section of config.toml.
#[derive(Debug, Deserialize, Clone)]
pub struct MenuConfig {
    /// Drink categories in display order
    pub categories: Vec<CategoryConfig>,
    /// Toppings in display order
    pub toppings: Vec<ToppingConfig>,
    /// Optional tea bases
    #[serde(default = "default_tea_bases")]
    pub tea_bases: Vec<String>,
    /// Allowed ice levels
    #[serde(default = "default_ice_levels")]
    pub ice_levels: Vec<String>,
    /// Allowed sugar levels
    #[serde(default = "default_sugar_levels")]
    pub sugar_levels: Vec<String>,
}

/// One `[[menu.categories]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct CategoryConfig {
    /// Category name, e.g. "Milk Tea"
    pub name: String,
    /// Unit price in dollars
    pub price: f64,
    /// Flavors in display order
    pub flavors: Vec<String>,
}

/// One `[[menu.toppings]]` entry.
#[derive(Debug, Deserialize, Clone)]
pub struct ToppingConfig {
    /// Topping name
    pub name: String,
    /// Surcharge class, defaults to standard
    #[serde(default = "default_class")]
    pub class: SurchargeClass,
}

fn default_class() -> SurchargeClass {
    SurchargeClass::Standard
}

fn default_tea_bases() -> Vec<String> {
    vec!["Black Tea".to_string(), "Green Tea".to_string()]
}

fn default_ice_levels() -> Vec<String> {
    ["No Ice", "25%", "50%", "75%", "100%"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_sugar_levels() -> Vec<String> {
    ["0%", "30%", "50%", "70%", "100%"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A validated drink category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Category name
    pub name: String,
    /// Unit price
    pub price: Decimal,
    /// Flavors, never empty
    pub flavors: Vec<String>,
}

/// A validated topping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topping {
    /// Topping name
    pub name: String,
    /// Surcharge class
    pub class: SurchargeClass,
}

/// Immutable menu reference data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuCatalog {
    categories: Vec<Category>,
    toppings: Vec<Topping>,
    tea_bases: Vec<String>,
    ice_levels: Vec<String>,
    sugar_levels: Vec<String>,
}

impl MenuCatalog {
    /// Validates a raw menu section.
    ///
    /// # Errors
    /// Returns `Error::Config` when a category has no flavors, a price is
    /// negative or not finite, or a category or topping name repeats.
    pub fn from_config(config: &MenuConfig) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut categories = Vec::with_capacity(config.categories.len());
        for raw in &config.categories {
            let name = raw.name.trim().to_string();
            if name.is_empty() {
                return Err(config_error("Category name cannot be empty"));
            }
            if !seen.insert(name.clone()) {
                return Err(config_error(format!("Duplicate category '{name}'")));
            }
            if raw.flavors.is_empty() {
                return Err(config_error(format!("Category '{name}' has no flavors")));
            }
            if !raw.price.is_finite() || raw.price < 0.0 {
                return Err(config_error(format!(
                    "Category '{name}' has invalid price {}",
                    raw.price
                )));
            }
            let price = Decimal::try_from(raw.price)
                .map_err(|e| config_error(format!("Category '{name}' price: {e}")))?
                .round_dp(2);
            categories.push(Category {
                name,
                price,
                flavors: raw.flavors.clone(),
            });
        }

        let mut seen = HashSet::new();
        let mut toppings = Vec::with_capacity(config.toppings.len());
        for raw in &config.toppings {
            if !seen.insert(raw.name.clone()) {
                return Err(config_error(format!("Duplicate topping '{}'", raw.name)));
            }
            toppings.push(Topping {
                name: raw.name.clone(),
                class: raw.class,
            });
        }

        Ok(Self {
            categories,
            toppings,
            tea_bases: config.tea_bases.clone(),
            ice_levels: config.ice_levels.clone(),
            sugar_levels: config.sugar_levels.clone(),
        })
    }

    /// All categories in display order.
    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Looks up a category by exact name.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// All toppings in display order.
    #[must_use]
    pub fn toppings(&self) -> &[Topping] {
        &self.toppings
    }

    /// Looks up a topping by exact name.
    #[must_use]
    pub fn topping(&self, name: &str) -> Option<&Topping> {
        self.toppings.iter().find(|t| t.name == name)
    }

    /// Surcharge class for a topping name. Unknown names count as standard.
    #[must_use]
    pub fn surcharge_class(&self, topping: &str) -> SurchargeClass {
        self.topping(topping)
            .map_or(SurchargeClass::Standard, |t| t.class)
    }

    /// Known tea bases.
    #[must_use]
    pub fn tea_bases(&self) -> &[String] {
        &self.tea_bases
    }

    /// Known ice levels.
    #[must_use]
    pub fn ice_levels(&self) -> &[String] {
        &self.ice_levels
    }

    /// Known sugar levels.
    #[must_use]
    pub fn sugar_levels(&self) -> &[String] {
        &self.sugar_levels
    }
}

fn config_error(message: impl Into<String>) -> Error {
    Error::Config {
        message: message.into(),
    }
}
