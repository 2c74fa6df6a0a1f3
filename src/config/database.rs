//! Database configuration module.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. The unique indexes on `(order_day, order_number)` and on the
//! archive's source order are added by hand.

use crate::entities::{Order, OrderColumn, SystemState, UnpaidArchive, UnpaidArchiveColumn};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Name of the unique index backing order number race detection.
pub const ORDER_NUMBER_INDEX: &str = "idx_orders_day_number";

/// Name of the unique index allowing one archive record per order.
pub const ARCHIVE_SOURCE_INDEX: &str = "idx_unpaid_archive_source_order";

/// Upper bound on waiting for a pooled connection or a new socket.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Establishes a connection to the database at `database_url`.
///
/// Connection and acquire timeouts are bounded so that a stalled store turns
/// into an error instead of a hung command.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .connect_timeout(CONNECT_TIMEOUT)
        .acquire_timeout(CONNECT_TIMEOUT)
        .sqlx_logging(false);

    debug!("Connecting to database");
    let db = Database::connect(options).await?;
    info!("Database connection established");
    Ok(db)
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Safe to call on every start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut order_table = schema.create_table_from_entity(Order);
    let mut archive_table = schema.create_table_from_entity(UnpaidArchive);
    let mut system_state_table = schema.create_table_from_entity(SystemState);

    order_table.if_not_exists();
    archive_table.if_not_exists();
    system_state_table.if_not_exists();

    db.execute(builder.build(&order_table)).await?;
    db.execute(builder.build(&archive_table)).await?;
    db.execute(builder.build(&system_state_table)).await?;

    let order_number_index = Index::create()
        .name(ORDER_NUMBER_INDEX)
        .table(Order)
        .col(OrderColumn::OrderDay)
        .col(OrderColumn::OrderNumber)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&order_number_index)).await?;

    let archive_source_index = Index::create()
        .name(ARCHIVE_SOURCE_INDEX)
        .table(UnpaidArchive)
        .col(UnpaidArchiveColumn::SourceOrderId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&archive_source_index)).await?;

    info!("Database tables ensured");
    Ok(())
}
