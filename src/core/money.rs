//! Currency helpers.
//!
//! Amounts are `Decimal` everywhere in the domain and integer cents in the
//! database. Every amount that is displayed or stored goes through [`round2`].

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds to the cent, half away from zero.
#[must_use]
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Builds an amount from integer cents.
#[must_use]
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Converts an amount to integer cents after rounding to the cent.
///
/// Saturates at the `i64` bounds, which no real order approaches.
#[must_use]
pub fn to_cents(amount: Decimal) -> i64 {
    let mut rounded = round2(amount);
    rounded.rescale(2);
    i64::try_from(rounded.mantissa()).unwrap_or(if rounded.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

/// Formats an amount as `$1.23`.
#[must_use]
pub fn format_usd(amount: Decimal) -> String {
    format!("${:.2}", round2(amount))
}
