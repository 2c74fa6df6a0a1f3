//! Admin order management.
//!
//! Every mutation here is a plain repository write. Deleting does not
//! resequence; renumbering is an explicit admin action.

use crate::config::MenuCatalog;
use crate::core::cart::validate_line;
use crate::core::numbering::OrderNumbering;
use crate::core::pricing::{price_of, with_tax};
use crate::core::state;
use crate::errors::{Error, Result};
use crate::models::{Order, OrderLine, OrderPatch, PaymentMethod};
use crate::repository::{KeyValueStore, OrderFilter, OrderRepository, OrderSort};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

/// Summary of a day's orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderStats {
    /// Orders (drinks) placed
    pub count: u32,
    /// Sum of pre-tax prices
    pub pre_tax_total: Decimal,
    /// Sum of tax-inclusive prices
    pub total_with_tax: Decimal,
    /// Orders marked paid
    pub paid: u32,
    /// Orders marked picked up
    pub picked_up: u32,
    /// Drinks needed for the group order
    pub minimum: u32,
}

impl OrderStats {
    /// Drinks still needed to reach the minimum.
    #[must_use]
    pub const fn remaining_to_minimum(&self) -> u32 {
        self.minimum.saturating_sub(self.count)
    }

    /// True once the minimum is reached.
    #[must_use]
    pub const fn minimum_reached(&self) -> bool {
        self.count >= self.minimum
    }
}

/// Admin operations over the order store.
pub struct OrderAdmin {
    repo: Arc<dyn OrderRepository>,
    kv: Arc<dyn KeyValueStore>,
    numbering: Arc<OrderNumbering>,
    catalog: Arc<MenuCatalog>,
    minimum_orders: u32,
}

impl OrderAdmin {
    /// Creates the admin service.
    #[must_use]
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        kv: Arc<dyn KeyValueStore>,
        numbering: Arc<OrderNumbering>,
        catalog: Arc<MenuCatalog>,
        minimum_orders: u32,
    ) -> Self {
        Self {
            repo,
            kv,
            numbering,
            catalog,
            minimum_orders,
        }
    }

    /// A day's orders by order number.
    pub async fn list_orders(&self, day: NaiveDate) -> Result<Vec<Order>> {
        self.repo
            .query_orders(&OrderFilter::for_day(day), OrderSort::NumberAsc, None)
            .await
    }

    /// Looks an order up by id.
    pub async fn get(&self, id: i64) -> Result<Order> {
        self.repo
            .query_orders(&OrderFilter::by_id(id), OrderSort::NumberAsc, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or(Error::OrderNotFound { id })
    }

    /// Looks an order up by its number on `day`.
    pub async fn find_by_number(&self, day: NaiveDate, number: i32) -> Result<Order> {
        let filter = OrderFilter {
            order_day: Some(day),
            order_number: Some(number),
            ..OrderFilter::default()
        };
        self.repo
            .query_orders(&filter, OrderSort::NumberAsc, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::validation(format!("No order #{number} for {day}")))
    }

    /// Flips the paid flag, returning the updated order.
    pub async fn toggle_paid(&self, id: i64) -> Result<Order> {
        let order = self.get(id).await?;
        self.repo
            .update_order(
                id,
                OrderPatch {
                    paid: Some(!order.paid),
                    ..OrderPatch::default()
                },
            )
            .await?;
        info!("Order #{} paid = {}", order.order_number, !order.paid);
        self.get(id).await
    }

    /// Flips the picked-up flag, returning the updated order.
    pub async fn toggle_picked_up(&self, id: i64) -> Result<Order> {
        let order = self.get(id).await?;
        self.repo
            .update_order(
                id,
                OrderPatch {
                    picked_up: Some(!order.picked_up),
                    ..OrderPatch::default()
                },
            )
            .await?;
        info!("Order #{} picked up = {}", order.order_number, !order.picked_up);
        self.get(id).await
    }

    /// Applies an edit, re-pricing when a price-relevant field changes.
    ///
    /// Any price in `patch` is ignored; prices always come from the menu.
    ///
    /// # Errors
    /// `Error::Validation` if the edited drink or customer fields are invalid.
    pub async fn edit(&self, id: i64, mut patch: OrderPatch) -> Result<Order> {
        let order = self.get(id).await?;
        patch.price = None;

        if let Some(name) = &patch.customer_name {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                return Err(Error::validation("Customer name cannot be empty"));
            }
            patch.customer_name = Some(trimmed.to_string());
        }
        if let Some(method) = &patch.payment_method {
            let parsed: PaymentMethod = method.parse()?;
            patch.payment_method = Some(parsed.to_string());
        }

        let edited = apply_to_line(order.as_line(), &patch);
        if edited != order.as_line() {
            validate_line(&edited, &self.catalog)?;
        }
        if patch.affects_price() {
            patch.price = Some(price_of(&edited, &self.catalog));
        }

        self.repo.update_order(id, patch).await?;
        info!("Edited order #{}", order.order_number);
        self.get(id).await
    }

    /// Deletes one order. Numbers are not closed up.
    pub async fn delete(&self, id: i64) -> Result<Order> {
        let order = self.get(id).await?;
        let deleted = self.repo.delete_orders(&OrderFilter::by_id(id)).await?;
        if deleted == 0 {
            return Err(Error::OrderNotFound { id });
        }
        info!("Deleted order #{} ({})", order.order_number, order.customer_name);
        Ok(order)
    }

    /// Closes gaps in a day's numbering.
    pub async fn renumber(&self, day: NaiveDate) -> Result<usize> {
        self.numbering.resequence(day).await
    }

    /// Counts and totals for a day.
    pub async fn stats(&self, day: NaiveDate) -> Result<OrderStats> {
        let orders = self.list_orders(day).await?;
        let count_where = |pred: fn(&Order) -> bool| {
            u32::try_from(orders.iter().filter(|o| pred(o)).count()).unwrap_or(u32::MAX)
        };
        Ok(OrderStats {
            count: u32::try_from(orders.len()).unwrap_or(u32::MAX),
            pre_tax_total: orders.iter().map(|o| o.price).sum(),
            total_with_tax: orders.iter().map(|o| with_tax(o.price)).sum(),
            paid: count_where(|o| o.paid),
            picked_up: count_where(|o| o.picked_up),
            minimum: self.minimum_orders,
        })
    }

    /// Whether checkout is limited to the ordering window.
    pub async fn time_restrictions_enabled(&self) -> Result<bool> {
        state::time_restrictions_enabled(self.kv.as_ref()).await
    }

    /// Turns ordering-window enforcement on or off.
    pub async fn set_time_restrictions(&self, enabled: bool) -> Result<()> {
        state::set_time_restrictions(self.kv.as_ref(), enabled).await
    }
}

fn apply_to_line(mut line: OrderLine, patch: &OrderPatch) -> OrderLine {
    if let Some(flavor) = &patch.flavor {
        line.flavor.clone_from(flavor);
    }
    if let Some(tea_base) = &patch.tea_base {
        line.tea_base.clone_from(tea_base);
    }
    if let Some(size) = patch.size {
        line.size = size;
    }
    if let Some(ice) = &patch.ice_level {
        line.ice_level.clone_from(ice);
    }
    if let Some(sugar) = &patch.sugar_level {
        line.sugar_level.clone_from(sugar);
    }
    if let Some(toppings) = &patch.toppings {
        line.toppings.clone_from(toppings);
    }
    if let Some(crystal) = patch.crystal_boba {
        line.crystal_boba = crystal;
    }
    line
}
