//! Unpaid archive entity - Orders that were picked up but never paid.
//!
//! Rows are written by the nightly archival sweep. They are copies: the source
//! order is left in place.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Unpaid archive database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "unpaid_archive")]
pub struct Model {
    /// Unique identifier for the record
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Id of the order this record was copied from
    pub source_order_id: i64,
    /// Customer name
    pub customer_name: String,
    /// Amount owed including tax, in cents
    pub amount_cents: i64,
    /// When the original order was placed
    pub order_timestamp: DateTimeUtc,
    /// Human readable drink summary
    pub details: String,
    /// When the sweep wrote this record
    pub archived_at: DateTimeUtc,
}

/// Archive records have no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
