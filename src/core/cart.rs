//! Cart aggregation.
//!
//! A cart lives in session memory only. Adding, removing and totalling never
//! touch the repository; orders are written at checkout.

use crate::config::MenuCatalog;
use crate::core::money::round2;
use crate::core::pricing::{price_of, tax_on};
use crate::errors::{Error, Result};
use crate::models::OrderLine;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;

/// Checks a line against the menu before it may enter a cart.
///
/// # Errors
/// Returns `Error::Validation` naming the first problem found.
pub fn validate_line(line: &OrderLine, menu: &MenuCatalog) -> Result<()> {
    if line.category.trim().is_empty() {
        return Err(Error::validation("Please choose a drink category"));
    }
    if line.flavor.trim().is_empty() {
        return Err(Error::validation("Please choose a flavor"));
    }
    let Some(category) = menu.category(&line.category) else {
        return Err(Error::validation(format!(
            "'{}' is not on the menu",
            line.category
        )));
    };
    if !category.flavors.iter().any(|f| f == &line.flavor) {
        return Err(Error::validation(format!(
            "'{}' is not a {} flavor",
            line.flavor, category.name
        )));
    }
    if let Some(base) = &line.tea_base {
        if !menu.tea_bases().iter().any(|b| b == base) {
            return Err(Error::validation(format!("Unknown tea base '{base}'")));
        }
    }
    if !menu.ice_levels().iter().any(|l| l == &line.ice_level) {
        return Err(Error::validation(format!(
            "Unknown ice level '{}'",
            line.ice_level
        )));
    }
    if !menu.sugar_levels().iter().any(|l| l == &line.sugar_level) {
        return Err(Error::validation(format!(
            "Unknown sugar level '{}'",
            line.sugar_level
        )));
    }

    let mut seen = HashSet::new();
    for topping in &line.toppings {
        if menu.topping(topping).is_none() {
            return Err(Error::validation(format!("Unknown topping '{topping}'")));
        }
        if !seen.insert(topping.as_str()) {
            return Err(Error::validation(format!(
                "'{topping}' was selected more than once"
            )));
        }
    }

    if line.quantity == 0 {
        return Err(Error::validation("Quantity must be at least 1"));
    }
    Ok(())
}

/// One line in a cart with its session-local id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    /// Id used by `remove`, unique within the cart
    pub id: u64,
    /// The configured drink
    pub line: OrderLine,
}

/// A customer's cart.
#[derive(Debug, Clone)]
pub struct Cart {
    catalog: Arc<MenuCatalog>,
    entries: Vec<CartEntry>,
    next_id: u64,
}

impl Cart {
    /// Creates an empty cart priced against `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<MenuCatalog>) -> Self {
        Self {
            catalog,
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// The menu this cart prices against.
    #[must_use]
    pub fn catalog(&self) -> &MenuCatalog {
        &self.catalog
    }

    /// Validates and appends a line, returning its id.
    ///
    /// # Errors
    /// Returns `Error::Validation` if the line does not match the menu. The cart
    /// is left unchanged.
    pub fn add(&mut self, line: OrderLine) -> Result<u64> {
        validate_line(&line, &self.catalog)?;
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(CartEntry { id, line });
        Ok(id)
    }

    /// Removes a line by id, returning it if it was present.
    pub fn remove(&mut self, id: u64) -> Option<OrderLine> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index).line)
    }

    /// Appends the lines of `other` after this cart's own, under fresh ids.
    ///
    /// Used to put back a cart whose checkout failed while the customer had
    /// already started a new one. The lines were validated when first added.
    pub fn absorb(&mut self, other: Self) {
        for entry in other.entries {
            let id = self.next_id;
            self.next_id += 1;
            self.entries.push(CartEntry {
                id,
                line: entry.line,
            });
        }
    }

    /// Empties the cart.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    /// True when there are no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of drinks across all lines.
    #[must_use]
    pub fn drink_count(&self) -> u32 {
        self.entries.iter().map(|e| e.line.quantity).sum()
    }

    /// Pre-tax price of one line.
    #[must_use]
    pub fn line_price(&self, line: &OrderLine) -> Decimal {
        price_of(line, &self.catalog)
    }

    /// Sum of line prices, pre-tax.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.entries
            .iter()
            .map(|e| price_of(&e.line, &self.catalog))
            .sum()
    }

    /// Tax on the subtotal.
    #[must_use]
    pub fn tax(&self) -> Decimal {
        tax_on(self.subtotal())
    }

    /// Subtotal plus tax.
    #[must_use]
    pub fn total(&self) -> Decimal {
        round2(self.subtotal() + self.tax())
    }
}
