//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggestions come from the menu catalog loaded at startup, so they never
//! touch the database.

use crate::{
    bot::Context,
    models::{PaymentMethod, Size},
};
use poise::serenity_prelude as serenity;

/// Discord autocomplete limit
const MAX_SUGGESTIONS: usize = 25;

fn matching<'a>(options: impl IntoIterator<Item = &'a str>, partial: &str) -> Vec<String> {
    let partial_lower = partial.to_lowercase();
    options
        .into_iter()
        .filter(|option| option.to_lowercase().contains(&partial_lower))
        .map(String::from)
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Value the user has already entered for another top-level option.
fn option_value(ctx: Context<'_>, name: &str) -> Option<String> {
    let poise::Context::Application(app) = ctx else {
        return None;
    };
    app.interaction
        .data
        .options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| match &option.value {
            serenity::CommandDataOptionValue::String(value)
            | serenity::CommandDataOptionValue::Autocomplete { value, .. } => Some(value.clone()),
            _ => None,
        })
}

/// Suggests drink categories.
pub async fn autocomplete_category(ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching(
        ctx.data().catalog.categories().iter().map(|c| c.name.as_str()),
        partial,
    )
}

/// Suggests flavors of the chosen category, or of every category when none
/// has been chosen yet.
pub async fn autocomplete_flavor(ctx: Context<'_>, partial: &str) -> Vec<String> {
    let catalog = &ctx.data().catalog;
    if let Some(category) = option_value(ctx, "category").and_then(|name| catalog.category(&name))
    {
        return matching(category.flavors.iter().map(String::as_str), partial);
    }

    let mut flavors: Vec<&str> = catalog
        .categories()
        .iter()
        .flat_map(|c| c.flavors.iter().map(String::as_str))
        .collect();
    flavors.sort_unstable();
    flavors.dedup();
    matching(flavors, partial)
}

/// Suggests toppings.
pub async fn autocomplete_topping(ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching(
        ctx.data().catalog.toppings().iter().map(|t| t.name.as_str()),
        partial,
    )
}

/// Suggests tea bases.
pub async fn autocomplete_tea_base(ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching(
        ctx.data().catalog.tea_bases().iter().map(String::as_str),
        partial,
    )
}

/// Suggests ice levels.
pub async fn autocomplete_ice_level(ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching(
        ctx.data().catalog.ice_levels().iter().map(String::as_str),
        partial,
    )
}

/// Suggests sugar levels.
pub async fn autocomplete_sugar_level(ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching(
        ctx.data().catalog.sugar_levels().iter().map(String::as_str),
        partial,
    )
}

/// Suggests cup sizes.
pub async fn autocomplete_size(_ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching([Size::Regular.as_str(), Size::Large.as_str()], partial)
}

/// Suggests payment methods.
pub async fn autocomplete_payment_method(_ctx: Context<'_>, partial: &str) -> Vec<String> {
    matching(
        [PaymentMethod::Venmo, PaymentMethod::Zelle, PaymentMethod::Cash].map(PaymentMethod::as_str),
        partial,
    )
}
