//! Order entity - One submitted drink.
//!
//! Each row is a single drink (quantity 1). `order_day` and `order_number`
//! together are unique; the index is created alongside the table and is what
//! the numbering service relies on to detect concurrent reservations.
//! Prices are stored as integer cents and toppings as a JSON array.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Local calendar day the order was placed on
    pub order_day: Date,
    /// Day-scoped sequential order number
    pub order_number: i32,
    /// Customer name given at checkout
    pub customer_name: String,
    /// Menu category (e.g. "Milk Tea")
    pub category: String,
    /// Flavor within the category
    pub flavor: String,
    /// Optional tea base
    pub tea_base: Option<String>,
    /// `"Regular"` or `"Large"`
    pub size: String,
    /// Ice level label
    pub ice_level: String,
    /// Sugar level label
    pub sugar_level: String,
    /// Topping names as a JSON array
    pub toppings: String,
    /// Legacy standalone crystal boba flag
    pub crystal_boba: bool,
    /// Always 1 for submitted orders
    pub quantity: i32,
    /// Pre-tax price in cents
    pub price_cents: i64,
    /// Payment method chosen at checkout
    pub payment_method: String,
    /// When the order was submitted
    pub created_at: DateTimeUtc,
    /// Marked paid by an admin
    pub paid: bool,
    /// Marked picked up by an admin
    pub picked_up: bool,
}

/// Orders have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
