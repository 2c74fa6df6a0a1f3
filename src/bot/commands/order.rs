//! Customer ordering commands - build a cart and check out.
//!
//! Carts are held per Discord user in [`BotData`](crate::bot::BotData) and
//! nothing is written to the database until `/checkout` succeeds.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{Context, handlers::autocomplete},
        core::{cart::Cart, checkout::Receipt, money::format_usd},
        errors::Result,
        models::{OrderLine, Size},
    };
    use std::collections::hash_map::Entry;
    use std::fmt::Write;

    fn cart_summary(cart: &Cart) -> Result<String> {
        let mut summary = String::new();
        for entry in cart.entries() {
            writeln!(
                &mut summary,
                "`[{}]` {} × {} - {}",
                entry.id,
                entry.line.quantity,
                entry.line.describe(),
                format_usd(cart.line_price(&entry.line))
            )?;
        }
        writeln!(&mut summary, "\nSubtotal: {}", format_usd(cart.subtotal()))?;
        writeln!(&mut summary, "Tax: {}", format_usd(cart.tax()))?;
        write!(&mut summary, "**Total: {}**", format_usd(cart.total()))?;
        Ok(summary)
    }

    fn receipt_message(receipt: &Receipt) -> Result<String> {
        let numbers: Vec<String> = receipt
            .order_numbers()
            .iter()
            .map(|n| format!("#{n}"))
            .collect();

        let mut message = format!(
            "✅ **Order placed for {}!**\nYour order number(s): **{}**\n\n",
            receipt.customer_name,
            numbers.join(", ")
        );
        for order in &receipt.orders {
            writeln!(&mut message, "• {}", order.describe())?;
        }
        writeln!(&mut message, "\nSubtotal: {}", format_usd(receipt.subtotal))?;
        writeln!(&mut message, "Tax: {}", format_usd(receipt.tax))?;
        writeln!(&mut message, "**Total: {}**\n", format_usd(receipt.total))?;
        write!(
            &mut message,
            "💳 **{}:** {}",
            receipt.payment_method,
            receipt.payment_method.instructions()
        )?;
        Ok(message)
    }

    /// Adds a drink to your cart.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, prefix_command)]
    pub async fn order(
        ctx: Context<'_>,
        #[description = "Drink category"]
        #[autocomplete = "autocomplete::autocomplete_category"]
        category: String,
        #[description = "Flavor"]
        #[autocomplete = "autocomplete::autocomplete_flavor"]
        flavor: String,
        #[description = "Regular or Large"]
        #[autocomplete = "autocomplete::autocomplete_size"]
        size: Option<String>,
        #[description = "Tea base"]
        #[autocomplete = "autocomplete::autocomplete_tea_base"]
        tea_base: Option<String>,
        #[description = "Ice level (default 50%)"]
        #[autocomplete = "autocomplete::autocomplete_ice_level"]
        ice: Option<String>,
        #[description = "Sugar level (default 50%)"]
        #[autocomplete = "autocomplete::autocomplete_sugar_level"]
        sugar: Option<String>,
        #[description = "First topping"]
        #[autocomplete = "autocomplete::autocomplete_topping"]
        topping1: Option<String>,
        #[description = "Second topping"]
        #[autocomplete = "autocomplete::autocomplete_topping"]
        topping2: Option<String>,
        #[description = "Third topping"]
        #[autocomplete = "autocomplete::autocomplete_topping"]
        topping3: Option<String>,
        #[description = "Add crystal boba"] crystal_boba: Option<bool>,
        #[description = "How many of this drink"]
        #[min = 1]
        #[max = 20]
        quantity: Option<u32>,
    ) -> Result<()> {
        let data = ctx.data();

        let mut line = OrderLine::new(category.trim(), flavor.trim());
        if let Some(size) = size {
            line.size = size.parse::<Size>()?;
        }
        line.tea_base = tea_base.filter(|b| !b.trim().is_empty());
        if let Some(ice) = ice {
            line.ice_level = ice;
        }
        if let Some(sugar) = sugar {
            line.sugar_level = sugar;
        }
        line.toppings = [topping1, topping2, topping3]
            .into_iter()
            .flatten()
            .filter(|t| !t.trim().is_empty())
            .collect();
        line.crystal_boba = crystal_boba.unwrap_or(false);
        line.quantity = quantity.unwrap_or(1);

        let description = line.describe();
        let quantity = line.quantity;

        let mut carts = data.carts.lock().await;
        let cart = carts
            .entry(ctx.author().id)
            .or_insert_with(|| data.empty_cart());
        let price = cart.line_price(&line);
        let id = cart.add(line)?;
        let drinks = cart.drink_count();
        let subtotal = cart.subtotal();
        drop(carts);

        ctx.say(format!(
            "🛒 Added `[{id}]` {quantity} × {description} - {}\nCart: {drinks} drink(s), {} before tax. Use `/checkout` when ready.",
            format_usd(price),
            format_usd(subtotal)
        ))
        .await?;
        Ok(())
    }

    /// Shows your cart.
    #[poise::command(slash_command, prefix_command)]
    pub async fn cart(ctx: Context<'_>) -> Result<()> {
        let carts = ctx.data().carts.lock().await;
        let response = match carts.get(&ctx.author().id) {
            Some(cart) if !cart.is_empty() => {
                format!("🛒 **Your cart**\n\n{}", cart_summary(cart)?)
            }
            _ => "🛒 Your cart is empty. Add a drink with `/order`.".to_string(),
        };
        drop(carts);

        ctx.send(poise::CreateReply::default().content(response).ephemeral(true))
            .await?;
        Ok(())
    }

    /// Removes one item from your cart.
    #[poise::command(slash_command, prefix_command)]
    pub async fn remove(
        ctx: Context<'_>,
        #[description = "Item number shown by /cart"] item: u64,
    ) -> Result<()> {
        let removed = ctx
            .data()
            .carts
            .lock()
            .await
            .get_mut(&ctx.author().id)
            .and_then(|cart| cart.remove(item));

        let response = match removed {
            Some(line) => format!("🗑️ Removed {}.", line.describe()),
            None => format!("❌ No item `[{item}]` in your cart."),
        };
        ctx.say(response).await?;
        Ok(())
    }

    /// Empties your cart.
    #[poise::command(slash_command, prefix_command)]
    pub async fn clear_cart(ctx: Context<'_>) -> Result<()> {
        ctx.data().carts.lock().await.remove(&ctx.author().id);
        ctx.say("🗑️ Cart cleared.").await?;
        Ok(())
    }

    /// Places every drink in your cart.
    #[poise::command(slash_command, prefix_command)]
    pub async fn checkout(
        ctx: Context<'_>,
        #[description = "Name for pickup"] name: String,
        #[description = "Venmo, Zelle or Cash"]
        #[autocomplete = "autocomplete::autocomplete_payment_method"]
        payment: String,
    ) -> Result<()> {
        let data = ctx.data();
        let user = ctx.author().id;

        ctx.defer().await?;

        // Taken out of the map so other users are not blocked while numbering retries
        let mut cart = data
            .carts
            .lock()
            .await
            .remove(&user)
            .unwrap_or_else(|| data.empty_cart());

        let result = data
            .desk
            .checkout(&mut cart, &name, &payment, data.clock.now())
            .await;

        // Put the lines back without dropping a cart started in the meantime
        if !cart.is_empty() {
            match data.carts.lock().await.entry(user) {
                Entry::Occupied(mut newer) => newer.get_mut().absorb(cart),
                Entry::Vacant(slot) => {
                    slot.insert(cart);
                }
            }
        }

        let receipt = result?;
        ctx.say(receipt_message(&receipt)?).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
