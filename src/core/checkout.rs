//! Checkout: turns a cart into numbered orders.

use crate::config::OrderingConfig;
use crate::core::cart::Cart;
use crate::core::clock::local_day;
use crate::core::numbering::OrderNumbering;
use crate::core::ordering::ensure_ordering_allowed;
use crate::core::pricing::price_of;
use crate::errors::{Error, Result};
use crate::models::{NewOrder, Order, OrderLine, PaymentMethod};
use crate::repository::{KeyValueStore, OrderFilter, OrderRepository, OrderSort};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What the customer gets back after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Name the orders were placed under
    pub customer_name: String,
    /// Chosen payment method
    pub payment_method: PaymentMethod,
    /// One order per drink, in cart order
    pub orders: Vec<Order>,
    /// Cart subtotal
    pub subtotal: Decimal,
    /// Cart tax
    pub tax: Decimal,
    /// Cart total
    pub total: Decimal,
}

impl Receipt {
    /// Order numbers in cart order.
    #[must_use]
    pub fn order_numbers(&self) -> Vec<i32> {
        self.orders.iter().map(|o| o.order_number).collect()
    }
}

/// Validates and submits carts.
pub struct CheckoutDesk {
    repo: Arc<dyn OrderRepository>,
    kv: Arc<dyn KeyValueStore>,
    numbering: Arc<OrderNumbering>,
    ordering: OrderingConfig,
}

impl CheckoutDesk {
    /// Creates a desk.
    #[must_use]
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        kv: Arc<dyn KeyValueStore>,
        numbering: Arc<OrderNumbering>,
        ordering: OrderingConfig,
    ) -> Self {
        Self {
            repo,
            kv,
            numbering,
            ordering,
        }
    }

    /// Submits `cart` for `customer_name`.
    ///
    /// Each line becomes `quantity` orders of one drink. The cart is cleared
    /// only when the batch is stored.
    ///
    /// # Errors
    /// `Error::Validation` for a missing name or payment method, an empty cart,
    /// or a closed window; `Error::ConflictExhausted` if numbers could not be
    /// reserved; repository errors otherwise. Nothing is written on error.
    #[instrument(skip(self, cart), fields(lines = cart.entries().len()))]
    pub async fn checkout(
        &self,
        cart: &mut Cart,
        customer_name: &str,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<Receipt> {
        let customer_name = customer_name.trim();
        if customer_name.is_empty() {
            return Err(Error::validation("Please enter your name"));
        }
        let payment_method: PaymentMethod = payment_method.parse()?;
        if cart.is_empty() {
            return Err(Error::validation("Your cart is empty"));
        }
        ensure_ordering_allowed(self.kv.as_ref(), &self.ordering, now).await?;

        let day = local_day(now);
        let rows: Vec<NewOrder> = cart
            .entries()
            .iter()
            .flat_map(|entry| {
                let single = OrderLine {
                    quantity: 1,
                    ..entry.line.clone()
                };
                let price = price_of(&single, cart.catalog());
                std::iter::repeat_n(single, entry.line.quantity as usize).map(move |line| NewOrder {
                    order_day: day,
                    order_number: 0,
                    customer_name: customer_name.to_string(),
                    line,
                    price,
                    payment_method,
                    created_at: now,
                })
            })
            .collect();

        let mut orders = self.numbering.reserve_next_numbers(day, rows).await?;

        match self.numbering.resequence(day).await {
            Ok(0) => {}
            Ok(_) => self.refresh_numbers(&mut orders).await,
            Err(err) => warn!("Resequencing after checkout failed: {}", err),
        }

        let receipt = Receipt {
            customer_name: customer_name.to_string(),
            payment_method,
            orders,
            subtotal: cart.subtotal(),
            tax: cart.tax(),
            total: cart.total(),
        };
        cart.clear();

        info!(
            "Checkout for {} stored {} orders ({})",
            receipt.customer_name,
            receipt.orders.len(),
            receipt.total
        );
        Ok(receipt)
    }

    async fn refresh_numbers(&self, orders: &mut [Order]) {
        let Some(day) = orders.first().map(|o| o.order_day) else {
            return;
        };
        match self
            .repo
            .query_orders(&OrderFilter::for_day(day), OrderSort::NumberAsc, None)
            .await
        {
            Ok(current) => {
                let numbers: HashMap<i64, i32> =
                    current.iter().map(|o| (o.id, o.order_number)).collect();
                for order in orders.iter_mut() {
                    if let Some(number) = numbers.get(&order.id) {
                        order.order_number = *number;
                    }
                }
            }
            Err(err) => warn!("Could not re-read order numbers after resequencing: {}", err),
        }
    }
}
