//! Pricing engine.
//!
//! A drink costs its category price plus a size surcharge plus one surcharge
//! per topping. The group discount is taken off that unit amount, the result is
//! multiplied by quantity and rounded to the cent. Tax is never part of a line
//! price; it is added once over the whole cart by [`tax_on`].

use crate::config::MenuCatalog;
use crate::core::money::round2;
use crate::models::{OrderLine, Size, SurchargeClass};
use rust_decimal::Decimal;

/// Large cup surcharge, in cents.
pub const LARGE_SURCHARGE_CENTS: i64 = 85;
/// Standard topping surcharge, in cents.
pub const STANDARD_TOPPING_CENTS: i64 = 70;
/// Reduced topping surcharge, in cents.
pub const REDUCED_TOPPING_CENTS: i64 = 25;
/// Crystal boba surcharge, in cents.
pub const CRYSTAL_TOPPING_CENTS: i64 = 30;

/// Group discount as a fraction of the unit amount (20%).
#[must_use]
pub fn discount_rate() -> Decimal {
    Decimal::new(20, 2)
}

/// Sales tax rate (7.5%).
#[must_use]
pub fn tax_rate() -> Decimal {
    Decimal::new(75, 3)
}

/// Surcharge for one topping of the given class.
#[must_use]
pub fn topping_surcharge(class: SurchargeClass) -> Decimal {
    let cents = match class {
        SurchargeClass::Standard => STANDARD_TOPPING_CENTS,
        SurchargeClass::Reduced => REDUCED_TOPPING_CENTS,
        SurchargeClass::Crystal => CRYSTAL_TOPPING_CENTS,
    };
    Decimal::new(cents, 2)
}

/// Surcharge for the cup size.
#[must_use]
pub fn size_surcharge(size: Size) -> Decimal {
    match size {
        Size::Regular => Decimal::ZERO,
        Size::Large => Decimal::new(LARGE_SURCHARGE_CENTS, 2),
    }
}

/// Price of one drink before the discount, or `None` if the category is not
/// on the menu.
///
/// The standalone crystal boba flag adds the crystal surcharge on top of any
/// crystal topping already selected.
#[must_use]
pub fn unit_price_before_discount(line: &OrderLine, menu: &MenuCatalog) -> Option<Decimal> {
    let base = menu.category(&line.category)?.price;
    let toppings: Decimal = line
        .toppings
        .iter()
        .map(|name| topping_surcharge(menu.surcharge_class(name)))
        .sum();
    let crystal_flag = if line.crystal_boba {
        topping_surcharge(SurchargeClass::Crystal)
    } else {
        Decimal::ZERO
    };
    Some(base + size_surcharge(line.size) + toppings + crystal_flag)
}

/// Pre-tax price of a whole line.
///
/// Unknown categories price at zero rather than failing.
#[must_use]
pub fn price_of(line: &OrderLine, menu: &MenuCatalog) -> Decimal {
    let Some(unit) = unit_price_before_discount(line, menu) else {
        return Decimal::ZERO;
    };
    let discounted = unit * (Decimal::ONE - discount_rate());
    round2(discounted * Decimal::from(line.quantity)).max(Decimal::ZERO)
}

/// Tax on a pre-tax subtotal, rounded to the cent.
#[must_use]
pub fn tax_on(subtotal: Decimal) -> Decimal {
    round2(subtotal * tax_rate())
}

/// Tax-inclusive amount for a pre-tax amount, rounded to the cent.
#[must_use]
pub fn with_tax(pre_tax: Decimal) -> Decimal {
    round2(pre_tax * (Decimal::ONE + tax_rate()))
}
