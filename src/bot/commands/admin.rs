//! Admin Discord commands - login, order management, export and retention.
//!
//! Every subcommand except `login` requires the caller's session to be
//! authenticated. Replies are ephemeral so customer details stay out of the
//! channel.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{Context, handlers::autocomplete},
        core::{
            admin::OrderStats,
            clock::local_day,
            export::{export_csv, export_filename},
            money::format_usd,
            retention::{ArchiveOutcome, ArchiveTrigger},
        },
        errors::{Error, Result},
        models::{Order, OrderPatch, Size},
    };
    use chrono::NaiveDate;
    use poise::serenity_prelude as serenity;
    use std::fmt::Write;

    async fn reply(ctx: Context<'_>, content: impl Into<String>) -> Result<()> {
        ctx.send(
            poise::CreateReply::default()
                .content(content)
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }

    fn session(ctx: Context<'_>) -> String {
        ctx.author().id.to_string()
    }

    /// Replies and returns false when the caller is not logged in.
    async fn require_admin(ctx: Context<'_>) -> Result<bool> {
        if ctx.data().guard.is_authenticated(&session(ctx)).await {
            return Ok(true);
        }
        reply(ctx, "🔒 Admin login required. Use `/admin login`.").await?;
        Ok(false)
    }

    fn parse_day(ctx: Context<'_>, date: Option<&str>) -> Result<NaiveDate> {
        match date.map(str::trim).filter(|d| !d.is_empty()) {
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| Error::validation(format!("'{raw}' is not a YYYY-MM-DD date"))),
            None => Ok(local_day(ctx.data().clock.now())),
        }
    }

    fn order_line(order: &Order) -> String {
        let paid = if order.paid { "💰" } else { "⬜" };
        let picked_up = if order.picked_up { "📦" } else { "⬜" };
        format!(
            "{paid}{picked_up} **#{}** {} - {} - {} ({})",
            order.order_number,
            order.customer_name,
            order.as_line().describe(),
            format_usd(order.price),
            order.payment_method
        )
    }

    fn stats_summary(stats: &OrderStats) -> Result<String> {
        let mut summary = String::new();
        writeln!(
            &mut summary,
            "🧋 {} drink(s) | 💰 {} paid | 📦 {} picked up",
            stats.count, stats.paid, stats.picked_up
        )?;
        writeln!(
            &mut summary,
            "Pre-tax: {} | With tax: {}",
            format_usd(stats.pre_tax_total),
            format_usd(stats.total_with_tax)
        )?;
        if stats.minimum_reached() {
            write!(&mut summary, "✅ Minimum of {} reached", stats.minimum)?;
        } else {
            write!(
                &mut summary,
                "⏳ {} more needed for the minimum of {}",
                stats.remaining_to_minimum(),
                stats.minimum
            )?;
        }
        Ok(summary)
    }

    /// Admin tools for today's group order.
    #[poise::command(
        slash_command,
        subcommands(
            "admin_login",
            "admin_logout",
            "admin_orders",
            "admin_paid",
            "admin_picked_up",
            "admin_edit",
            "admin_delete",
            "admin_renumber",
            "admin_export",
            "admin_restrictions",
            "admin_archive"
        )
    )]
    pub async fn admin(ctx: Context<'_>) -> Result<()> {
        let help_text = "Admin commands. Available subcommands:\n\
        • `/admin login <password>` - Log in\n\
        • `/admin logout` - Log out\n\
        • `/admin orders [date]` - List orders with totals\n\
        • `/admin paid <number>` - Toggle paid\n\
        • `/admin pickedup <number>` - Toggle picked up\n\
        • `/admin edit <number> ...` - Edit an order\n\
        • `/admin delete <number>` - Delete an order\n\
        • `/admin renumber [date]` - Close gaps in numbering\n\
        • `/admin export [date]` - Download orders as CSV\n\
        • `/admin restrictions <on|off>` - Enforce the ordering window\n\
        • `/admin archive` - Archive fulfilled unpaid orders now";
        reply(ctx, help_text).await
    }

    /// Logs in as admin.
    #[poise::command(slash_command, rename = "login")]
    pub async fn admin_login(
        ctx: Context<'_>,
        #[description = "Admin password"] password: String,
    ) -> Result<()> {
        let guard = &ctx.data().guard;
        ctx.defer_ephemeral().await?;

        let ticket = guard.begin(&session(ctx)).await;
        let outcome = guard
            .submit(&ticket, &password, ctx.data().clock.now())
            .await?;
        reply(ctx, outcome.message()).await
    }

    /// Logs out of admin.
    #[poise::command(slash_command, rename = "logout")]
    pub async fn admin_logout(ctx: Context<'_>) -> Result<()> {
        ctx.data().guard.logout(&session(ctx)).await;
        reply(ctx, "👋 Logged out.").await
    }

    /// Lists a day's orders with totals.
    #[poise::command(slash_command, rename = "orders")]
    pub async fn admin_orders(
        ctx: Context<'_>,
        #[description = "Day as YYYY-MM-DD (default today)"] date: Option<String>,
    ) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        let day = parse_day(ctx, date.as_deref())?;
        let admin = &ctx.data().admin;
        let orders = admin.list_orders(day).await?;
        let stats = admin.stats(day).await?;

        let mut response = format!("📋 **Orders for {day}**\n\n");
        if orders.is_empty() {
            response.push_str("_No orders._\n");
        }
        for order in &orders {
            writeln!(&mut response, "{}", order_line(order))?;
        }
        writeln!(&mut response, "\n{}", stats_summary(&stats)?)?;

        reply(ctx, response).await
    }

    /// Toggles the paid flag on an order.
    #[poise::command(slash_command, rename = "paid")]
    pub async fn admin_paid(
        ctx: Context<'_>,
        #[description = "Order number"] number: i32,
        #[description = "Day as YYYY-MM-DD (default today)"] date: Option<String>,
    ) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        let admin = &ctx.data().admin;
        let order = admin
            .find_by_number(parse_day(ctx, date.as_deref())?, number)
            .await?;
        let order = admin.toggle_paid(order.id).await?;
        reply(
            ctx,
            format!(
                "Order #{} is now {}.",
                order.order_number,
                if order.paid { "paid 💰" } else { "unpaid" }
            ),
        )
        .await
    }

    /// Toggles the picked-up flag on an order.
    #[poise::command(slash_command, rename = "pickedup")]
    pub async fn admin_picked_up(
        ctx: Context<'_>,
        #[description = "Order number"] number: i32,
        #[description = "Day as YYYY-MM-DD (default today)"] date: Option<String>,
    ) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        let admin = &ctx.data().admin;
        let order = admin
            .find_by_number(parse_day(ctx, date.as_deref())?, number)
            .await?;
        let order = admin.toggle_picked_up(order.id).await?;
        reply(
            ctx,
            format!(
                "Order #{} is now {}.",
                order.order_number,
                if order.picked_up {
                    "picked up 📦"
                } else {
                    "waiting for pickup"
                }
            ),
        )
        .await
    }

    /// Edits an order. The price is recalculated from the menu.
    #[allow(clippy::too_many_arguments)]
    #[poise::command(slash_command, rename = "edit")]
    pub async fn admin_edit(
        ctx: Context<'_>,
        #[description = "Order number (today)"] number: i32,
        #[description = "Customer name"] name: Option<String>,
        #[description = "Payment method"]
        #[autocomplete = "autocomplete::autocomplete_payment_method"]
        payment: Option<String>,
        #[description = "Flavor"]
        #[autocomplete = "autocomplete::autocomplete_flavor"]
        flavor: Option<String>,
        #[description = "Regular or Large"]
        #[autocomplete = "autocomplete::autocomplete_size"]
        size: Option<String>,
        #[description = "Tea base, or \"none\" to clear"]
        #[autocomplete = "autocomplete::autocomplete_tea_base"]
        tea_base: Option<String>,
        #[description = "Ice level"]
        #[autocomplete = "autocomplete::autocomplete_ice_level"]
        ice: Option<String>,
        #[description = "Sugar level"]
        #[autocomplete = "autocomplete::autocomplete_sugar_level"]
        sugar: Option<String>,
        #[description = "Comma-separated toppings, or \"none\""] toppings: Option<String>,
        #[description = "Crystal boba"] crystal_boba: Option<bool>,
    ) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        let admin = &ctx.data().admin;
        let day = local_day(ctx.data().clock.now());
        let order = admin.find_by_number(day, number).await?;

        let patch = OrderPatch {
            customer_name: name,
            payment_method: payment,
            flavor,
            tea_base: tea_base.map(|base| {
                let base = base.trim().to_string();
                (!base.is_empty() && !base.eq_ignore_ascii_case("none")).then_some(base)
            }),
            size: size.map(|s| s.parse::<Size>()).transpose()?,
            ice_level: ice,
            sugar_level: sugar,
            toppings: toppings.map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("none"))
                    .map(String::from)
                    .collect()
            }),
            crystal_boba,
            ..OrderPatch::default()
        };
        if patch == OrderPatch::default() {
            return reply(ctx, "Nothing to change.").await;
        }

        let updated = admin.edit(order.id, patch).await?;
        reply(ctx, format!("✏️ Updated:\n{}", order_line(&updated))).await
    }

    /// Deletes an order. Other numbers are left as they are.
    #[poise::command(slash_command, rename = "delete")]
    pub async fn admin_delete(
        ctx: Context<'_>,
        #[description = "Order number (today)"] number: i32,
    ) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        let admin = &ctx.data().admin;
        let day = local_day(ctx.data().clock.now());
        let order = admin.find_by_number(day, number).await?;
        let deleted = admin.delete(order.id).await?;
        reply(
            ctx,
            format!(
                "🗑️ Deleted order #{} for {}. Use `/admin renumber` to close the gap.",
                deleted.order_number, deleted.customer_name
            ),
        )
        .await
    }

    /// Renumbers a day's orders 1..n by creation time.
    #[poise::command(slash_command, rename = "renumber")]
    pub async fn admin_renumber(
        ctx: Context<'_>,
        #[description = "Day as YYYY-MM-DD (default today)"] date: Option<String>,
    ) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        let day = parse_day(ctx, date.as_deref())?;
        let moved = ctx.data().admin.renumber(day).await?;
        let response = if moved == 0 {
            format!("Orders for {day} are already numbered in sequence.")
        } else {
            format!("🔢 Renumbered {moved} order(s) for {day}.")
        };
        reply(ctx, response).await
    }

    /// Downloads a day's orders as CSV.
    #[poise::command(slash_command, rename = "export")]
    pub async fn admin_export(
        ctx: Context<'_>,
        #[description = "Day as YYYY-MM-DD (default today)"] date: Option<String>,
    ) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        let day = parse_day(ctx, date.as_deref())?;
        let orders = ctx.data().admin.list_orders(day).await?;
        let csv = export_csv(&orders, &ctx.data().catalog)?;

        ctx.send(
            poise::CreateReply::default()
                .content(format!("📄 {} order(s) for {day}", orders.len()))
                .attachment(serenity::CreateAttachment::bytes(csv, export_filename(day)))
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }

    /// Turns the ordering window on or off.
    #[poise::command(slash_command, rename = "restrictions")]
    pub async fn admin_restrictions(
        ctx: Context<'_>,
        #[description = "Only accept orders during the ordering window"] enabled: bool,
    ) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        ctx.data().admin.set_time_restrictions(enabled).await?;
        let response = if enabled {
            "⏰ Time restrictions on: checkout only during the ordering window."
        } else {
            "🔓 Time restrictions off: checkout accepted any time."
        };
        reply(ctx, response).await
    }

    /// Archives fulfilled unpaid orders now.
    #[poise::command(slash_command, rename = "archive")]
    pub async fn admin_archive(ctx: Context<'_>) -> Result<()> {
        if !require_admin(ctx).await? {
            return Ok(());
        }
        ctx.defer_ephemeral().await?;
        let outcome = ctx.data().scheduler.archive(ArchiveTrigger::Admin).await?;
        let response = match outcome {
            ArchiveOutcome::Archived { records } => {
                format!("🗄️ Archived {records} picked-up unpaid order(s) for today.")
            }
            ArchiveOutcome::Busy => "⏳ An archival sweep is already running.".to_string(),
            ArchiveOutcome::BeforeCutoff | ArchiveOutcome::AlreadyDone => {
                "Nothing to archive right now.".to_string()
            }
        };
        reply(ctx, response).await
    }
}

// Re-export all commands
pub use inner::*;
