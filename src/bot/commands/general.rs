//! General Discord commands - ping, help, menu and ordering status.
//! None of these change any state.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::Context,
        core::{
            clock::local_day,
            money::format_usd,
            ordering::{ordering_status, status_message},
            pricing::{size_surcharge, topping_surcharge},
        },
        errors::Result,
        models::Size,
    };
    use std::fmt::Write;

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: Context<'_>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: Context<'_>) -> Result<()> {
        let help_text = "**Boba Club Help**\n\
        Build a cart, then check out once to get your order numbers.\n\n\
        **Ordering**\n\
        • `/menu` - Shows drinks, toppings and prices.\n\
        • `/order <category> <flavor> [size] [tea_base] [ice] [sugar] [toppings] [quantity]` - Adds a drink to your cart.\n\
        • `/cart` - Shows your cart and total.\n\
        • `/remove <item>` - Removes one item from your cart.\n\
        • `/clear_cart` - Empties your cart.\n\
        • `/checkout <name> <payment>` - Places every drink in your cart.\n\n\
        **Information**\n\
        • `/status` - Shows whether orders are open and progress toward the group minimum.\n\
        • `/ping` - Checks if the bot is responsive.\n\n\
        **Admin**\n\
        • `/admin login <password>` then `/admin <subcommand>` to manage today's orders.";

        ctx.say(help_text).await?;
        Ok(())
    }

    /// Shows the menu with prices.
    #[poise::command(slash_command, prefix_command)]
    pub async fn menu(ctx: Context<'_>) -> Result<()> {
        let catalog = &ctx.data().catalog;

        let mut response = String::from("🧋 **Menu**\n\n");
        for category in catalog.categories() {
            writeln!(
                &mut response,
                "**{}** - {}",
                category.name,
                format_usd(category.price)
            )?;
            writeln!(&mut response, "  {}", category.flavors.join(", "))?;
        }

        writeln!(
            &mut response,
            "\n📏 **Large:** +{}",
            format_usd(size_surcharge(Size::Large))
        )?;

        if !catalog.toppings().is_empty() {
            response.push_str("\n**Toppings**\n");
            for topping in catalog.toppings() {
                writeln!(
                    &mut response,
                    "• {} +{}",
                    topping.name,
                    format_usd(topping_surcharge(topping.class))
                )?;
            }
        }

        if !catalog.tea_bases().is_empty() {
            writeln!(&mut response, "\n🍵 **Tea bases:** {}", catalog.tea_bases().join(", "))?;
        }
        writeln!(&mut response, "🧊 **Ice:** {}", catalog.ice_levels().join(", "))?;
        writeln!(&mut response, "🍬 **Sugar:** {}", catalog.sugar_levels().join(", "))?;
        response.push_str("\n_Prices include the group discount; tax is added at checkout._");

        ctx.say(response).await?;
        Ok(())
    }

    /// Shows whether orders are open and how close today is to the minimum.
    #[poise::command(slash_command, prefix_command)]
    pub async fn status(ctx: Context<'_>) -> Result<()> {
        let data = ctx.data();
        let now = data.clock.now();
        let ordering = &data.config.ordering;

        let status = ordering_status(ordering, now);
        let stats = data.admin.stats(local_day(now)).await?;
        let restricted = data.admin.time_restrictions_enabled().await?;

        let mut response = format!("📣 **{}**\n", status_message(ordering, status));
        if !restricted {
            response.push_str("_Time restrictions are off; orders are accepted any time._\n");
        }
        writeln!(
            &mut response,
            "\n🧋 **{}** drink(s) ordered today",
            stats.count
        )?;
        if stats.minimum_reached() {
            writeln!(&mut response, "✅ Minimum of {} reached!", stats.minimum)?;
        } else {
            writeln!(
                &mut response,
                "⏳ {} more needed to reach the minimum of {}",
                stats.remaining_to_minimum(),
                stats.minimum
            )?;
        }

        ctx.say(response).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
