//! CSV export of orders for the shop.

use crate::config::MenuCatalog;
use crate::core::money::round2;
use crate::core::pricing::with_tax;
use crate::errors::{Error, Result};
use crate::models::{Order, SurchargeClass};
use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};

/// Column headers, in order.
pub const HEADERS: [&str; 15] = [
    "Order Number",
    "Customer Name",
    "Drink Category",
    "Flavor",
    "Tea Base",
    "Size",
    "Ice Level",
    "Sugar Level",
    "Regular Topping 1",
    "Regular Topping 2",
    "Special Topping (+25¢)",
    "Crystal Boba (+30¢)",
    "Quantity",
    "Price",
    "Total (incl. tax)",
];

/// Download name for an export made on `day`.
#[must_use]
pub fn export_filename(day: NaiveDate) -> String {
    format!("boba-orders-{}.csv", day.format("%Y-%m-%d"))
}

fn row(order: &Order, menu: &MenuCatalog) -> Vec<String> {
    let mut regular = Vec::new();
    let mut special = Vec::new();
    let mut crystal = order.crystal_boba;
    for topping in &order.toppings {
        match menu.surcharge_class(topping) {
            SurchargeClass::Standard => regular.push(topping.as_str()),
            SurchargeClass::Reduced => special.push(topping.as_str()),
            SurchargeClass::Crystal => crystal = true,
        }
    }

    let name = if order.customer_name.is_empty() {
        "Pending"
    } else {
        order.customer_name.as_str()
    };

    vec![
        order.order_number.to_string(),
        name.to_string(),
        order.category.clone(),
        order.flavor.clone(),
        order.tea_base.clone().unwrap_or_else(|| "N/A".to_string()),
        order.size.to_string(),
        order.ice_level.clone(),
        order.sugar_level.clone(),
        regular.first().copied().unwrap_or_default().to_string(),
        regular.get(1).copied().unwrap_or_default().to_string(),
        special.first().copied().unwrap_or_default().to_string(),
        if crystal { "Yes" } else { "" }.to_string(),
        order.quantity.to_string(),
        format!("{:.2}", round2(order.price)),
        format!("{:.2}", with_tax(order.price)),
    ]
}

/// Renders `orders` as CSV with every field quoted.
///
/// # Errors
/// `Error::Validation` when there is nothing to export.
pub fn export_csv(orders: &[Order], menu: &MenuCatalog) -> Result<Vec<u8>> {
    if orders.is_empty() {
        return Err(Error::validation("No orders to export"));
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(HEADERS)?;
    for order in orders {
        writer.write_record(row(order, menu))?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}
