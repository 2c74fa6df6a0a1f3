//! Storage contracts consumed by the core.
//!
//! The core never talks to sea-orm directly for orders or archive records; it
//! goes through [`OrderRepository`] so that numbering and retention logic can
//! be exercised against fault-injecting wrappers. [`KeyValueStore`] covers the
//! small string state (toggles, day markers, leases, lockout counters).

pub mod sql;

pub use sql::SqlStore;

use crate::errors::Result;
use crate::models::{NewArchiveRecord, NewOrder, Order, OrderPatch, UnpaidArchiveRecord};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Row selection for order queries and deletes. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    /// Exact repository id
    pub id: Option<i64>,
    /// Local calendar day
    pub order_day: Option<NaiveDate>,
    /// Exact order number
    pub order_number: Option<i32>,
    /// Created at or after this instant
    pub created_from: Option<DateTime<Utc>>,
    /// Created strictly before this instant
    pub created_before: Option<DateTime<Utc>>,
    /// Paid flag
    pub paid: Option<bool>,
    /// Picked-up flag
    pub picked_up: Option<bool>,
}

impl OrderFilter {
    /// Matches a single order by id.
    #[must_use]
    pub fn by_id(id: i64) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Matches every order of a day.
    #[must_use]
    pub fn for_day(day: NaiveDate) -> Self {
        Self {
            order_day: Some(day),
            ..Self::default()
        }
    }
}

/// Result ordering for order queries. Ties are always broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSort {
    /// Oldest first
    CreatedAsc,
    /// Newest first
    CreatedDesc,
    /// Lowest number first
    NumberAsc,
    /// Highest number first
    NumberDesc,
}

/// Row selection for archive queries and deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveFilter {
    /// Original order placed at or after this instant
    pub order_from: Option<DateTime<Utc>>,
    /// Original order placed strictly before this instant
    pub order_before: Option<DateTime<Utc>>,
}

/// The order store.
///
/// Implementations must make `insert_orders`, `renumber_orders` and
/// `replace_archive` all-or-nothing, and must report a day/number uniqueness
/// violation as [`crate::errors::Error::NumberConflict`] rather than a generic
/// database error.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Fetches orders matching `filter`.
    async fn query_orders(
        &self,
        filter: &OrderFilter,
        sort: OrderSort,
        limit: Option<u64>,
    ) -> Result<Vec<Order>>;

    /// Inserts a batch of orders, returning them with ids assigned.
    async fn insert_orders(&self, rows: Vec<NewOrder>) -> Result<Vec<Order>>;

    /// Applies a partial update to one order.
    async fn update_order(&self, id: i64, patch: OrderPatch) -> Result<()>;

    /// Sets new order numbers for several orders at once.
    async fn renumber_orders(&self, changes: &[(i64, i32)]) -> Result<()>;

    /// Deletes orders matching `filter`, returning how many went.
    async fn delete_orders(&self, filter: &OrderFilter) -> Result<u64>;

    /// Fetches archive records matching `filter`, oldest order first.
    async fn query_archive(&self, filter: &ArchiveFilter) -> Result<Vec<UnpaidArchiveRecord>>;

    /// Replaces every archive record in `window` with `rows`, returning the
    /// records the window holds afterwards.
    ///
    /// The delete and the inserts commit together. A row whose source order
    /// already has a record overwrites that record, so concurrent callers
    /// never leave two records for one order.
    async fn replace_archive(
        &self,
        window: &ArchiveFilter,
        rows: Vec<NewArchiveRecord>,
    ) -> Result<Vec<UnpaidArchiveRecord>>;
}

/// String key-value state.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a value.
    async fn get_value(&self, key: &str) -> Result<Option<String>>;

    /// Writes or replaces a value.
    async fn set_value(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a key. Removing a missing key is not an error.
    async fn remove_value(&self, key: &str) -> Result<()>;
}
