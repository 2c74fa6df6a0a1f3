//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for the group order desk,
//! including all slash commands, autocomplete handlers, and bot context
//! management.

/// Discord command implementations (order, admin, general)
pub mod commands;
/// Discord interaction handlers (autocomplete)
pub mod handlers;

use crate::{
    config::{AppConfig, MenuCatalog},
    core::{
        admin::OrderAdmin, auth::AdminGuard, cart::Cart, checkout::CheckoutDesk, clock::Clock,
        retention::RetentionScheduler,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

/// Poise context used by every command.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Shared data available to all bot commands.
/// Carts live here, one per Discord user, and are lost on restart.
pub struct BotData {
    /// Loaded config.toml
    pub config: Arc<AppConfig>,
    /// Validated menu
    pub catalog: Arc<MenuCatalog>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Cart submission
    pub desk: CheckoutDesk,
    /// Admin order management
    pub admin: OrderAdmin,
    /// Admin login guard
    pub guard: AdminGuard,
    /// Purge and archival runner
    pub scheduler: Arc<RetentionScheduler>,
    /// Open carts by user
    pub carts: Mutex<HashMap<serenity::UserId, Cart>>,
}

impl BotData {
    /// Bundles the services the commands need.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        catalog: Arc<MenuCatalog>,
        clock: Arc<dyn Clock>,
        desk: CheckoutDesk,
        admin: OrderAdmin,
        guard: AdminGuard,
        scheduler: Arc<RetentionScheduler>,
    ) -> Self {
        Self {
            config,
            catalog,
            clock,
            desk,
            admin,
            guard,
            scheduler,
            carts: Mutex::new(HashMap::new()),
        }
    }

    /// A fresh cart over the current menu.
    #[must_use]
    pub fn empty_cart(&self) -> Cart {
        Cart::new(Arc::clone(&self.catalog))
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let reply = match &error {
                Error::Validation { message } => format!("❌ {message}"),
                Error::ConflictExhausted { .. } | Error::Connectivity { .. } => {
                    format!("⚠️ {error}")
                }
                _ => {
                    error!("Error in command `{}`: {:?}", ctx.command().name, error);
                    "❌ Something went wrong, please try again.".to_string()
                }
            };
            if let Err(e) = ctx
                .send(poise::CreateReply::default().content(reply).ephemeral(true))
                .await
            {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Starts the Discord client and blocks until it stops.
///
/// # Errors
/// Returns the framework error if the client cannot be built or stops with
/// an error.
#[instrument(skip(token, data))]
pub async fn run_bot(token: String, data: BotData) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::menu(),
                commands::status(),
                commands::order(),
                commands::cart(),
                commands::remove(),
                commands::clear_cart(),
                commands::checkout(),
                commands::admin(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
