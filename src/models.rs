//! Canonical domain records shared by the core, the repository and the bot.
//!
//! Entities in [`crate::entities`] are the storage shape; everything above the
//! repository works with these types only.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::Error;

/// Cup size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Size {
    /// Standard cup
    #[default]
    Regular,
    /// Upsized cup, carries a fixed surcharge
    Large,
}

impl Size {
    /// Name as stored and displayed.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::Large => "Large",
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Size {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "large" => Ok(Self::Large),
            other => Err(Error::validation(format!("Unknown size '{other}'"))),
        }
    }
}

/// Surcharge class of a topping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurchargeClass {
    /// Regular topping
    Standard,
    /// Discounted topping (puddings, grass jelly)
    Reduced,
    /// Crystal boba
    Crystal,
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Venmo transfer
    Venmo,
    /// Zelle transfer
    Zelle,
    /// Cash at pickup
    Cash,
}

impl PaymentMethod {
    /// Name as stored and displayed.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Venmo => "Venmo",
            Self::Zelle => "Zelle",
            Self::Cash => "Cash",
        }
    }

    /// Payment instructions shown after checkout.
    #[must_use]
    pub const fn instructions(self) -> &'static str {
        match self {
            Self::Venmo => "Pay via Venmo and indicate the payment is for Boba.",
            Self::Zelle => "Pay via Zelle and include that the payment is for Boba.",
            Self::Cash => {
                "Pay with cash upon pickup. We have limited change and may not be able to compensate fully."
            }
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "venmo" => Ok(Self::Venmo),
            "zelle" => Ok(Self::Zelle),
            "cash" => Ok(Self::Cash),
            "" => Err(Error::validation("Please choose a payment method")),
            other => Err(Error::validation(format!("Unknown payment method '{other}'"))),
        }
    }
}

/// One configured drink in a cart, before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Menu category
    pub category: String,
    /// Flavor within the category
    pub flavor: String,
    /// Optional tea base
    pub tea_base: Option<String>,
    /// Cup size
    pub size: Size,
    /// Ice level label
    pub ice_level: String,
    /// Sugar level label
    pub sugar_level: String,
    /// Selected toppings by name, in selection order
    pub toppings: Vec<String>,
    /// Legacy standalone crystal boba flag
    pub crystal_boba: bool,
    /// Number of drinks, at least 1
    pub quantity: u32,
}

impl OrderLine {
    /// Builds a regular single drink with default ice and sugar and no toppings.
    pub fn new(category: impl Into<String>, flavor: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            flavor: flavor.into(),
            tea_base: None,
            size: Size::Regular,
            ice_level: "50%".to_string(),
            sugar_level: "50%".to_string(),
            toppings: Vec::new(),
            crystal_boba: false,
            quantity: 1,
        }
    }

    /// Short human readable description, e.g. `Milk Tea - Mango (Large, ice 50%, sugar 30%, Honey Boba)`.
    #[must_use]
    pub fn describe(&self) -> String {
        describe_drink(
            &self.category,
            &self.flavor,
            self.tea_base.as_deref(),
            self.size,
            &self.ice_level,
            &self.sugar_level,
            &self.toppings,
            self.crystal_boba,
        )
    }
}

/// A persisted, submitted drink. Always quantity 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Repository-assigned id
    pub id: i64,
    /// Local calendar day the order belongs to
    pub order_day: NaiveDate,
    /// Day-scoped sequential number
    pub order_number: i32,
    /// Customer name given at checkout
    pub customer_name: String,
    /// Menu category
    pub category: String,
    /// Flavor
    pub flavor: String,
    /// Optional tea base
    pub tea_base: Option<String>,
    /// Cup size
    pub size: Size,
    /// Ice level label
    pub ice_level: String,
    /// Sugar level label
    pub sugar_level: String,
    /// Topping names
    pub toppings: Vec<String>,
    /// Legacy crystal boba flag
    pub crystal_boba: bool,
    /// Always 1 after submission
    pub quantity: u32,
    /// Pre-tax price
    pub price: Decimal,
    /// Payment method chosen at checkout
    pub payment_method: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Marked paid by an admin
    pub paid: bool,
    /// Marked picked up by an admin
    pub picked_up: bool,
}

impl Order {
    /// Rebuilds the drink configuration of this order as a single-quantity line.
    #[must_use]
    pub fn as_line(&self) -> OrderLine {
        OrderLine {
            category: self.category.clone(),
            flavor: self.flavor.clone(),
            tea_base: self.tea_base.clone(),
            size: self.size,
            ice_level: self.ice_level.clone(),
            sugar_level: self.sugar_level.clone(),
            toppings: self.toppings.clone(),
            crystal_boba: self.crystal_boba,
            quantity: 1,
        }
    }

    /// Human readable description used in archive records and listings.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("Order #{}: {}", self.order_number, self.as_line().describe())
    }
}

/// An order about to be inserted; numbering fills in `order_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// Local calendar day
    pub order_day: NaiveDate,
    /// Proposed number, assigned by the numbering service
    pub order_number: i32,
    /// Customer name
    pub customer_name: String,
    /// Single-quantity drink configuration
    pub line: OrderLine,
    /// Pre-tax price of one drink
    pub price: Decimal,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Partial update of an order. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPatch {
    /// New customer name
    pub customer_name: Option<String>,
    /// New payment method
    pub payment_method: Option<String>,
    /// New flavor
    pub flavor: Option<String>,
    /// New tea base (`Some(None)` clears it)
    pub tea_base: Option<Option<String>>,
    /// New size
    pub size: Option<Size>,
    /// New ice level
    pub ice_level: Option<String>,
    /// New sugar level
    pub sugar_level: Option<String>,
    /// Replacement topping list
    pub toppings: Option<Vec<String>>,
    /// New crystal flag
    pub crystal_boba: Option<bool>,
    /// New pre-tax price
    pub price: Option<Decimal>,
    /// New paid flag
    pub paid: Option<bool>,
    /// New picked-up flag
    pub picked_up: Option<bool>,
}

impl OrderPatch {
    /// True when the patch touches a field that changes the price.
    #[must_use]
    pub const fn affects_price(&self) -> bool {
        self.flavor.is_some()
            || self.size.is_some()
            || self.toppings.is_some()
            || self.crystal_boba.is_some()
    }
}

/// A fulfilled-but-unpaid order copied out by the nightly sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpaidArchiveRecord {
    /// Repository-assigned id
    pub id: i64,
    /// Order the record was taken from
    pub source_order_id: i64,
    /// Customer name
    pub customer_name: String,
    /// Amount owed including tax
    pub amount: Decimal,
    /// When the order was originally placed
    pub order_timestamp: DateTime<Utc>,
    /// Human readable summary of the drink
    pub details: String,
    /// When the sweep wrote the record
    pub archived_at: DateTime<Utc>,
}

/// Archive record about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewArchiveRecord {
    /// Order the record is taken from
    pub source_order_id: i64,
    /// Customer name
    pub customer_name: String,
    /// Amount owed including tax
    pub amount: Decimal,
    /// Original order timestamp
    pub order_timestamp: DateTime<Utc>,
    /// Human readable summary
    pub details: String,
    /// Sweep timestamp
    pub archived_at: DateTime<Utc>,
}

#[allow(clippy::too_many_arguments)]
fn describe_drink(
    category: &str,
    flavor: &str,
    tea_base: Option<&str>,
    size: Size,
    ice_level: &str,
    sugar_level: &str,
    toppings: &[String],
    crystal_boba: bool,
) -> String {
    let mut extras = vec![
        size.to_string(),
        format!("ice {ice_level}"),
        format!("sugar {sugar_level}"),
    ];
    if let Some(base) = tea_base {
        extras.push(base.to_string());
    }
    extras.extend(toppings.iter().cloned());
    if crystal_boba {
        extras.push("Crystal Boba".to_string());
    }
    format!("{category} - {flavor} ({})", extras.join(", "))
}
