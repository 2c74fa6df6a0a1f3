//! Shared test utilities for the order desk.
//!
//! This module provides helpers for setting up in-memory databases, building
//! fixture orders with sensible defaults, and wrapping the store with injected
//! faults (conflicts, slow or failing reads, failing archive writes).

#![allow(clippy::unwrap_used, missing_docs)]

use crate::{
    config::{MenuCatalog, menu::MenuConfig},
    core::clock::{Clock, local_instant},
    errors::{Error, Result},
    models::{NewArchiveRecord, NewOrder, Order, OrderLine, OrderPatch, PaymentMethod, Size, UnpaidArchiveRecord},
    repository::{ArchiveFilter, OrderFilter, OrderRepository, OrderSort, SqlStore},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a store over a fresh in-memory database.
pub async fn setup_test_store() -> Result<SqlStore> {
    Ok(SqlStore::new(setup_test_db().await?))
}

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// A small menu used across tests.
///
/// * Milk Tea $4.45: Mango, Taro
/// * Fruit Tea $4.27: Lemon, Passionfruit
/// * Toppings: Honey Boba, Red Bean (standard), Egg Pudding (reduced),
///   Crystal Boba (crystal)
pub fn test_catalog() -> MenuCatalog {
    let config: MenuConfig = toml::from_str(
        r#"
        [[categories]]
        name = "Milk Tea"
        price = 4.45
        flavors = ["Mango", "Taro"]

        [[categories]]
        name = "Fruit Tea"
        price = 4.27
        flavors = ["Lemon", "Passionfruit"]

        [[toppings]]
        name = "Honey Boba"

        [[toppings]]
        name = "Red Bean"

        [[toppings]]
        name = "Egg Pudding"
        class = "reduced"

        [[toppings]]
        name = "Crystal Boba"
        class = "crystal"
        "#,
    )
    .unwrap();
    MenuCatalog::from_config(&config).unwrap()
}

/// UTC instant of a local wall-clock time.
pub fn at(day: NaiveDate, hour: u32, minute: u32) -> DateTime<Utc> {
    local_instant(day, NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
}

/// A regular Milk Tea Mango order priced at $3.56, paid by Venmo.
pub fn new_order(
    day: NaiveDate,
    order_number: i32,
    customer_name: &str,
    created_at: DateTime<Utc>,
) -> NewOrder {
    NewOrder {
        order_day: day,
        order_number,
        customer_name: customer_name.to_string(),
        line: OrderLine::new("Milk Tea", "Mango"),
        price: Decimal::new(356, 2),
        payment_method: PaymentMethod::Venmo,
        created_at,
    }
}

/// An in-memory order matching [`new_order`], for pure functions.
pub fn sample_order(id: i64, order_number: i32) -> Order {
    let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    Order {
        id,
        order_day: day,
        order_number,
        customer_name: "Ana".to_string(),
        category: "Milk Tea".to_string(),
        flavor: "Mango".to_string(),
        tea_base: None,
        size: Size::Regular,
        ice_level: "50%".to_string(),
        sugar_level: "50%".to_string(),
        toppings: Vec::new(),
        crystal_boba: false,
        quantity: 1,
        price: Decimal::new(356, 2),
        payment_method: "Venmo".to_string(),
        created_at: at(day, 9, 0),
        paid: false,
        picked_up: false,
    }
}

/// A clock that only moves when told to.
pub struct FixedClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

fn injected(message: &str) -> Error {
    Error::Connectivity {
        message: message.to_string(),
    }
}

/// Store wrapper with switchable faults.
pub struct FaultyRepository {
    inner: SqlStore,
    /// Inserts that fail with a conflict before reaching the store
    pub forced_conflicts: AtomicU32,
    /// Before the next insert, another writer takes its first number
    pub rival_on_next_insert: AtomicBool,
    /// Order reads fail
    pub fail_reads: AtomicBool,
    /// Archive writes fail
    pub fail_archive_writes: AtomicBool,
    /// Calls to `insert_orders`
    pub insert_calls: AtomicU32,
    read_delay: Mutex<Option<Duration>>,
}

impl FaultyRepository {
    pub fn new(inner: SqlStore) -> Self {
        Self {
            inner,
            forced_conflicts: AtomicU32::new(0),
            rival_on_next_insert: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_archive_writes: AtomicBool::new(false),
            insert_calls: AtomicU32::new(0),
            read_delay: Mutex::new(None),
        }
    }

    /// Delays every order read.
    pub async fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock().await = delay;
    }
}

#[async_trait]
impl OrderRepository for FaultyRepository {
    async fn query_orders(
        &self,
        filter: &OrderFilter,
        sort: OrderSort,
        limit: Option<u64>,
    ) -> Result<Vec<Order>> {
        let delay = *self.read_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("injected read failure"));
        }
        self.inner.query_orders(filter, sort, limit).await
    }

    async fn insert_orders(&self, rows: Vec<NewOrder>) -> Result<Vec<Order>> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::NumberConflict);
        }
        if self.rival_on_next_insert.swap(false, Ordering::SeqCst) {
            if let Some(first) = rows.first() {
                let rival = new_order(
                    first.order_day,
                    first.order_number,
                    "Rival",
                    first.created_at - chrono::Duration::minutes(1),
                );
                self.inner.insert_orders(vec![rival]).await?;
            }
        }
        self.inner.insert_orders(rows).await
    }

    async fn update_order(&self, id: i64, patch: OrderPatch) -> Result<()> {
        self.inner.update_order(id, patch).await
    }

    async fn renumber_orders(&self, changes: &[(i64, i32)]) -> Result<()> {
        self.inner.renumber_orders(changes).await
    }

    async fn delete_orders(&self, filter: &OrderFilter) -> Result<u64> {
        self.inner.delete_orders(filter).await
    }

    async fn query_archive(&self, filter: &ArchiveFilter) -> Result<Vec<UnpaidArchiveRecord>> {
        self.inner.query_archive(filter).await
    }

    async fn replace_archive(
        &self,
        window: &ArchiveFilter,
        rows: Vec<NewArchiveRecord>,
    ) -> Result<Vec<UnpaidArchiveRecord>> {
        if self.fail_archive_writes.load(Ordering::SeqCst) {
            return Err(injected("injected archive write failure"));
        }
        self.inner.replace_archive(window, rows).await
    }
}
