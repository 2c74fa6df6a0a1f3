//! sea-orm backed store.
//!
//! All conversion between entity rows and domain records happens here: cents
//! to `Decimal`, the JSON topping column to a `Vec<String>`, size strings to
//! [`Size`]. Nothing above this module sees an entity model for orders or
//! archive records.

use crate::{
    core::money,
    entities::{
        Order as OrderEntity, OrderColumn, SystemState, SystemStateColumn, UnpaidArchive,
        UnpaidArchiveColumn, order, system_state, unpaid_archive,
    },
    errors::{Error, Result},
    models::{NewArchiveRecord, NewOrder, Order, OrderPatch, Size, UnpaidArchiveRecord},
    repository::{ArchiveFilter, KeyValueStore, OrderFilter, OrderRepository, OrderSort},
};
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::{debug, instrument, warn};

/// Order, archive and key-value store over one sea-orm connection.
#[derive(Debug, Clone)]
pub struct SqlStore {
    db: DatabaseConnection,
}

impl SqlStore {
    /// Wraps an open connection. Tables must already exist.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn map_write_error(err: DbErr) -> Error {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        Error::NumberConflict
    } else {
        Error::Database(err)
    }
}

fn order_condition(filter: &OrderFilter) -> Condition {
    let mut cond = Condition::all();
    if let Some(id) = filter.id {
        cond = cond.add(OrderColumn::Id.eq(id));
    }
    if let Some(day) = filter.order_day {
        cond = cond.add(OrderColumn::OrderDay.eq(day));
    }
    if let Some(number) = filter.order_number {
        cond = cond.add(OrderColumn::OrderNumber.eq(number));
    }
    if let Some(from) = filter.created_from {
        cond = cond.add(OrderColumn::CreatedAt.gte(from));
    }
    if let Some(before) = filter.created_before {
        cond = cond.add(OrderColumn::CreatedAt.lt(before));
    }
    if let Some(paid) = filter.paid {
        cond = cond.add(OrderColumn::Paid.eq(paid));
    }
    if let Some(picked_up) = filter.picked_up {
        cond = cond.add(OrderColumn::PickedUp.eq(picked_up));
    }
    cond
}

fn archive_condition(filter: &ArchiveFilter) -> Condition {
    let mut cond = Condition::all();
    if let Some(from) = filter.order_from {
        cond = cond.add(UnpaidArchiveColumn::OrderTimestamp.gte(from));
    }
    if let Some(before) = filter.order_before {
        cond = cond.add(UnpaidArchiveColumn::OrderTimestamp.lt(before));
    }
    cond
}

fn corrupt(message: String) -> Error {
    Error::Database(DbErr::Type(message))
}

fn order_from_model(model: order::Model) -> Result<Order> {
    let size: Size = model
        .size
        .parse()
        .map_err(|_| corrupt(format!("order {} has unknown size '{}'", model.id, model.size)))?;
    let toppings: Vec<String> = serde_json::from_str(&model.toppings)?;

    Ok(Order {
        id: model.id,
        order_day: model.order_day,
        order_number: model.order_number,
        customer_name: model.customer_name,
        category: model.category,
        flavor: model.flavor,
        tea_base: model.tea_base,
        size,
        ice_level: model.ice_level,
        sugar_level: model.sugar_level,
        toppings,
        crystal_boba: model.crystal_boba,
        quantity: u32::try_from(model.quantity).unwrap_or(1),
        price: money::from_cents(model.price_cents),
        payment_method: model.payment_method,
        created_at: model.created_at,
        paid: model.paid,
        picked_up: model.picked_up,
    })
}

fn new_order_to_active(row: NewOrder) -> Result<order::ActiveModel> {
    let line = row.line;
    Ok(order::ActiveModel {
        order_day: Set(row.order_day),
        order_number: Set(row.order_number),
        customer_name: Set(row.customer_name),
        category: Set(line.category),
        flavor: Set(line.flavor),
        tea_base: Set(line.tea_base),
        size: Set(line.size.to_string()),
        ice_level: Set(line.ice_level),
        sugar_level: Set(line.sugar_level),
        toppings: Set(serde_json::to_string(&line.toppings)?),
        crystal_boba: Set(line.crystal_boba),
        quantity: Set(1),
        price_cents: Set(money::to_cents(row.price)),
        payment_method: Set(row.payment_method.to_string()),
        created_at: Set(row.created_at),
        paid: Set(false),
        picked_up: Set(false),
        ..Default::default()
    })
}

fn archive_from_model(model: unpaid_archive::Model) -> UnpaidArchiveRecord {
    UnpaidArchiveRecord {
        id: model.id,
        source_order_id: model.source_order_id,
        customer_name: model.customer_name,
        amount: money::from_cents(model.amount_cents),
        order_timestamp: model.order_timestamp,
        details: model.details,
        archived_at: model.archived_at,
    }
}

#[async_trait]
impl OrderRepository for SqlStore {
    #[instrument(skip(self))]
    async fn query_orders(
        &self,
        filter: &OrderFilter,
        sort: OrderSort,
        limit: Option<u64>,
    ) -> Result<Vec<Order>> {
        let mut query = OrderEntity::find().filter(order_condition(filter));
        query = match sort {
            OrderSort::CreatedAsc => query
                .order_by_asc(OrderColumn::CreatedAt)
                .order_by_asc(OrderColumn::Id),
            OrderSort::CreatedDesc => query
                .order_by_desc(OrderColumn::CreatedAt)
                .order_by_desc(OrderColumn::Id),
            OrderSort::NumberAsc => query
                .order_by_asc(OrderColumn::OrderNumber)
                .order_by_asc(OrderColumn::Id),
            OrderSort::NumberDesc => query
                .order_by_desc(OrderColumn::OrderNumber)
                .order_by_desc(OrderColumn::Id),
        };
        if let Some(limit) = limit {
            query = query.limit(limit);
        }

        let models = query.all(&self.db).await?;
        debug!("Fetched {} orders", models.len());
        models.into_iter().map(order_from_model).collect()
    }

    async fn insert_orders(&self, rows: Vec<NewOrder>) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        // One transaction so a conflict on any row leaves nothing behind
        let txn = self.db.begin().await?;
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            let active = new_order_to_active(row)?;
            match active.insert(&txn).await {
                Ok(model) => inserted.push(model),
                Err(err) => {
                    let mapped = map_write_error(err);
                    if let Err(rollback_err) = txn.rollback().await {
                        warn!("Rollback after failed order insert failed: {}", rollback_err);
                    }
                    return Err(mapped);
                }
            }
        }
        txn.commit().await?;

        debug!("Inserted {} orders", inserted.len());
        inserted.into_iter().map(order_from_model).collect()
    }

    async fn update_order(&self, id: i64, patch: OrderPatch) -> Result<()> {
        let model = OrderEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(Error::OrderNotFound { id })?;
        if patch == OrderPatch::default() {
            return Ok(());
        }

        let mut active: order::ActiveModel = model.into();
        if let Some(name) = patch.customer_name {
            active.customer_name = Set(name);
        }
        if let Some(method) = patch.payment_method {
            active.payment_method = Set(method);
        }
        if let Some(flavor) = patch.flavor {
            active.flavor = Set(flavor);
        }
        if let Some(tea_base) = patch.tea_base {
            active.tea_base = Set(tea_base);
        }
        if let Some(size) = patch.size {
            active.size = Set(size.to_string());
        }
        if let Some(ice) = patch.ice_level {
            active.ice_level = Set(ice);
        }
        if let Some(sugar) = patch.sugar_level {
            active.sugar_level = Set(sugar);
        }
        if let Some(toppings) = patch.toppings {
            active.toppings = Set(serde_json::to_string(&toppings)?);
        }
        if let Some(crystal) = patch.crystal_boba {
            active.crystal_boba = Set(crystal);
        }
        if let Some(price) = patch.price {
            active.price_cents = Set(money::to_cents(price));
        }
        if let Some(paid) = patch.paid {
            active.paid = Set(paid);
        }
        if let Some(picked_up) = patch.picked_up {
            active.picked_up = Set(picked_up);
        }

        active.update(&self.db).await.map_err(map_write_error)?;
        Ok(())
    }

    async fn renumber_orders(&self, changes: &[(i64, i32)]) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        // Park every moving row on a negative number first so that swaps never
        // trip the (day, number) index halfway through.
        let txn = self.db.begin().await?;
        for phase in [true, false] {
            for &(id, number) in changes {
                let value = if phase { -number } else { number };
                let result = OrderEntity::update_many()
                    .col_expr(OrderColumn::OrderNumber, Expr::value(value))
                    .filter(OrderColumn::Id.eq(id))
                    .exec(&txn)
                    .await;
                if let Err(err) = result {
                    let mapped = map_write_error(err);
                    if let Err(rollback_err) = txn.rollback().await {
                        warn!("Rollback after failed renumber failed: {}", rollback_err);
                    }
                    return Err(mapped);
                }
            }
        }
        txn.commit().await?;
        Ok(())
    }

    async fn delete_orders(&self, filter: &OrderFilter) -> Result<u64> {
        let result = OrderEntity::delete_many()
            .filter(order_condition(filter))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    async fn query_archive(&self, filter: &ArchiveFilter) -> Result<Vec<UnpaidArchiveRecord>> {
        let models = UnpaidArchive::find()
            .filter(archive_condition(filter))
            .order_by_asc(UnpaidArchiveColumn::OrderTimestamp)
            .order_by_asc(UnpaidArchiveColumn::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(archive_from_model).collect())
    }

    async fn replace_archive(
        &self,
        window: &ArchiveFilter,
        rows: Vec<NewArchiveRecord>,
    ) -> Result<Vec<UnpaidArchiveRecord>> {
        let txn = self.db.begin().await?;
        match write_archive(&txn, window, rows).await {
            Ok(models) => {
                txn.commit().await?;
                Ok(models.into_iter().map(archive_from_model).collect())
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!("Rollback after failed archive write failed: {}", rollback_err);
                }
                Err(err.into())
            }
        }
    }
}

/// Clears `window`, upserts `rows` by source order and reads the window back.
async fn write_archive(
    txn: &DatabaseTransaction,
    window: &ArchiveFilter,
    rows: Vec<NewArchiveRecord>,
) -> std::result::Result<Vec<unpaid_archive::Model>, DbErr> {
    let cleared = UnpaidArchive::delete_many()
        .filter(archive_condition(window))
        .exec(txn)
        .await?
        .rows_affected;
    if cleared > 0 {
        debug!("Cleared {} archive records before rewrite", cleared);
    }

    for row in rows {
        let active = unpaid_archive::ActiveModel {
            source_order_id: Set(row.source_order_id),
            customer_name: Set(row.customer_name),
            amount_cents: Set(money::to_cents(row.amount)),
            order_timestamp: Set(row.order_timestamp),
            details: Set(row.details),
            archived_at: Set(row.archived_at),
            ..Default::default()
        };
        UnpaidArchive::insert(active)
            .on_conflict(
                OnConflict::column(UnpaidArchiveColumn::SourceOrderId)
                    .update_columns([
                        UnpaidArchiveColumn::CustomerName,
                        UnpaidArchiveColumn::AmountCents,
                        UnpaidArchiveColumn::OrderTimestamp,
                        UnpaidArchiveColumn::Details,
                        UnpaidArchiveColumn::ArchivedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(txn)
            .await?;
    }

    UnpaidArchive::find()
        .filter(archive_condition(window))
        .order_by_asc(UnpaidArchiveColumn::OrderTimestamp)
        .order_by_asc(UnpaidArchiveColumn::Id)
        .all(txn)
        .await
}

#[async_trait]
impl KeyValueStore for SqlStore {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let state = SystemState::find()
            .filter(SystemStateColumn::Key.eq(key))
            .one(&self.db)
            .await?;
        debug!("System state for key '{}': {:?}", key, state.as_ref().map(|s| &s.value));
        Ok(state.map(|s| s.value))
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        let row = system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(chrono::Utc::now()),
            ..Default::default()
        };
        SystemState::insert(row)
            .on_conflict(
                OnConflict::column(SystemStateColumn::Key)
                    .update_columns([SystemStateColumn::Value, SystemStateColumn::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        Ok(())
    }

    async fn remove_value(&self, key: &str) -> Result<()> {
        SystemState::delete_many()
            .filter(SystemStateColumn::Key.eq(key))
            .exec(&self.db)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use chrono::{Duration, NaiveDate};
    use rust_decimal::Decimal;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_query_round_trips_domain_fields() -> Result<()> {
        let store = setup_test_store().await?;
        let mut row = new_order(day(), 1, "Ana", at(day(), 9, 0));
        row.line.toppings = vec!["Honey Boba".to_string(), "Egg Pudding".to_string()];
        row.line.size = Size::Large;
        row.price = Decimal::new(480, 2);

        let inserted = store.insert_orders(vec![row]).await?;
        assert_eq!(inserted.len(), 1);

        let fetched = store
            .query_orders(&OrderFilter::for_day(day()), OrderSort::NumberAsc, None)
            .await?;
        assert_eq!(fetched, inserted);
        assert_eq!(fetched[0].toppings, vec!["Honey Boba", "Egg Pudding"]);
        assert_eq!(fetched[0].size, Size::Large);
        assert_eq!(fetched[0].price, Decimal::new(480, 2));
        assert!(!fetched[0].paid);

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_number_is_conflict_and_batch_rolls_back() -> Result<()> {
        let store = setup_test_store().await?;
        store
            .insert_orders(vec![new_order(day(), 1, "Ana", at(day(), 9, 0))])
            .await?;

        let result = store
            .insert_orders(vec![
                new_order(day(), 2, "Ben", at(day(), 9, 5)),
                new_order(day(), 1, "Cy", at(day(), 9, 6)),
            ])
            .await;
        assert!(matches!(result, Err(Error::NumberConflict)));

        // Order 2 must not have survived the failed batch
        let all = store
            .query_orders(&OrderFilter::for_day(day()), OrderSort::NumberAsc, None)
            .await?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].customer_name, "Ana");

        Ok(())
    }

    #[tokio::test]
    async fn test_same_number_on_different_days_is_allowed() -> Result<()> {
        let store = setup_test_store().await?;
        let other_day = day().succ_opt().unwrap();
        store
            .insert_orders(vec![
                new_order(day(), 1, "Ana", at(day(), 9, 0)),
                new_order(other_day, 1, "Ben", at(other_day, 9, 0)),
            ])
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_renumber_swaps_without_conflict() -> Result<()> {
        let store = setup_test_store().await?;
        let inserted = store
            .insert_orders(vec![
                new_order(day(), 1, "Ana", at(day(), 9, 0)),
                new_order(day(), 2, "Ben", at(day(), 9, 5)),
            ])
            .await?;

        store
            .renumber_orders(&[(inserted[0].id, 2), (inserted[1].id, 1)])
            .await?;

        let all = store
            .query_orders(&OrderFilter::for_day(day()), OrderSort::NumberAsc, None)
            .await?;
        assert_eq!(all[0].customer_name, "Ben");
        assert_eq!(all[1].customer_name, "Ana");

        Ok(())
    }

    #[tokio::test]
    async fn test_filters_and_sorting() -> Result<()> {
        let store = setup_test_store().await?;
        let inserted = store
            .insert_orders(vec![
                new_order(day(), 1, "Ana", at(day(), 9, 0)),
                new_order(day(), 2, "Ben", at(day(), 10, 0)),
                new_order(day(), 3, "Cy", at(day(), 11, 0)),
            ])
            .await?;
        store
            .update_order(
                inserted[1].id,
                OrderPatch {
                    picked_up: Some(true),
                    ..OrderPatch::default()
                },
            )
            .await?;

        let picked = store
            .query_orders(
                &OrderFilter {
                    picked_up: Some(true),
                    paid: Some(false),
                    ..OrderFilter::default()
                },
                OrderSort::CreatedAsc,
                None,
            )
            .await?;
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].customer_name, "Ben");

        let newest = store
            .query_orders(&OrderFilter::default(), OrderSort::CreatedDesc, Some(1))
            .await?;
        assert_eq!(newest[0].customer_name, "Cy");

        let before_ten = store
            .query_orders(
                &OrderFilter {
                    created_before: Some(at(day(), 10, 0)),
                    ..OrderFilter::default()
                },
                OrderSort::CreatedAsc,
                None,
            )
            .await?;
        assert_eq!(before_ten.len(), 1);

        let highest = store
            .query_orders(&OrderFilter::for_day(day()), OrderSort::NumberDesc, Some(1))
            .await?;
        assert_eq!(highest[0].order_number, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_order() -> Result<()> {
        let store = setup_test_store().await?;
        let result = store.update_order(999, OrderPatch::default()).await;
        assert!(matches!(result, Err(Error::OrderNotFound { id: 999 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_orders_by_filter() -> Result<()> {
        let store = setup_test_store().await?;
        let inserted = store
            .insert_orders(vec![
                new_order(day(), 1, "Ana", at(day(), 9, 0)),
                new_order(day(), 2, "Ben", at(day(), 9, 5)),
            ])
            .await?;

        let deleted = store.delete_orders(&OrderFilter::by_id(inserted[0].id)).await?;
        assert_eq!(deleted, 1);
        let remaining = store
            .query_orders(&OrderFilter::default(), OrderSort::NumberAsc, None)
            .await?;
        assert_eq!(remaining.len(), 1);
        Ok(())
    }

    fn archive_record(source_order_id: i64, name: &str, hours: i64) -> NewArchiveRecord {
        let base = at(day(), 9, 0);
        NewArchiveRecord {
            source_order_id,
            customer_name: name.to_string(),
            amount: Decimal::new(383, 2),
            order_timestamp: base + Duration::hours(hours),
            details: "Milk Tea - Mango".to_string(),
            archived_at: base,
        }
    }

    fn today_window() -> ArchiveFilter {
        let base = at(day(), 0, 0);
        ArchiveFilter {
            order_from: Some(base),
            order_before: Some(base + Duration::hours(24)),
        }
    }

    #[tokio::test]
    async fn test_replace_archive_only_touches_its_window() -> Result<()> {
        let store = setup_test_store().await?;
        let everything = ArchiveFilter::default();
        store
            .replace_archive(
                &everything,
                vec![archive_record(1, "Ana", 0), archive_record(2, "Ben", 30)],
            )
            .await?;

        let today = store.query_archive(&today_window()).await?;
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].customer_name, "Ana");
        assert_eq!(today[0].amount, Decimal::new(383, 2));

        // Emptying today's window leaves tomorrow's record alone
        let kept = store.replace_archive(&today_window(), Vec::new()).await?;
        assert!(kept.is_empty());
        let remaining = store.query_archive(&everything).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].customer_name, "Ben");
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_archive_keeps_one_record_per_source_order() -> Result<()> {
        let store = setup_test_store().await?;
        store
            .replace_archive(&today_window(), vec![archive_record(7, "Ana", 0)])
            .await?;

        // A writer whose window missed the first record still overwrites it
        let narrow = ArchiveFilter {
            order_from: Some(at(day(), 12, 0)),
            order_before: Some(at(day(), 13, 0)),
        };
        let mut renamed = archive_record(7, "Ana B", 0);
        renamed.amount = Decimal::new(500, 2);
        store.replace_archive(&narrow, vec![renamed]).await?;

        let all = store.query_archive(&ArchiveFilter::default()).await?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source_order_id, 7);
        assert_eq!(all[0].customer_name, "Ana B");
        assert_eq!(all[0].amount, Decimal::new(500, 2));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_archive_rewrites_do_not_duplicate() -> Result<()> {
        let store = setup_test_store().await?;
        let rows = || vec![archive_record(1, "Ana", 0), archive_record(2, "Ben", 1)];

        let (window_a, window_b) = (today_window(), today_window());
        let (first, second) = tokio::join!(
            store.replace_archive(&window_a, rows()),
            store.replace_archive(&window_b, rows()),
        );
        first?;
        second?;

        assert_eq!(store.query_archive(&ArchiveFilter::default()).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_key_value_round_trip() -> Result<()> {
        let store = setup_test_store().await?;

        assert_eq!(store.get_value("toggle").await?, None);
        store.set_value("toggle", "true").await?;
        assert_eq!(store.get_value("toggle").await?.as_deref(), Some("true"));

        store.set_value("toggle", "false").await?;
        assert_eq!(store.get_value("toggle").await?.as_deref(), Some("false"));

        store.remove_value("toggle").await?;
        assert_eq!(store.get_value("toggle").await?, None);
        store.remove_value("toggle").await?;
        Ok(())
    }
}
