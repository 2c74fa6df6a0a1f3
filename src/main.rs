use boba_club::{
    bot::{self, BotData},
    config::{self, database, settings},
    core::{
        admin::OrderAdmin,
        auth::AdminGuard,
        checkout::CheckoutDesk,
        clock::{Clock, SystemClock},
        numbering::OrderNumbering,
        retention::RetentionScheduler,
        verifier::{CredentialVerifier, DigestVerifier, FallbackVerifier, RemoteVerifier},
    },
    errors::{Error, Result},
    repository::{KeyValueStore, OrderRepository, SqlStore},
};
use dotenvy::dotenv;
use std::{env, sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load settings and config.toml
    let settings = settings::load_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    let app_config = Arc::new(
        config::load_config(&settings.config_path)
            .inspect_err(|e| error!("Failed to load configuration: {}", e))?,
    );
    let catalog = Arc::new(app_config.catalog()?);
    info!(
        "Loaded menu with {} categories and {} toppings",
        catalog.categories().len(),
        catalog.toppings().len()
    );

    // 4. Initialize database
    let db = database::create_connection(&settings.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Wire services
    let store = Arc::new(SqlStore::new(db));
    let repo: Arc<dyn OrderRepository> = Arc::clone(&store) as Arc<dyn OrderRepository>;
    let kv: Arc<dyn KeyValueStore> = store;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let remote = settings.admin_verify_url.clone().map(|url| {
        info!("Admin passwords are verified remotely at {}", url);
        Box::new(RemoteVerifier::new(
            url,
            Duration::from_secs(app_config.security.verify_timeout_seconds),
        )) as Box<dyn CredentialVerifier>
    });
    let verifier: Arc<dyn CredentialVerifier> = Arc::new(FallbackVerifier::new(
        remote,
        Box::new(DigestVerifier::new(settings.admin_password_digest.clone())),
    ));
    let guard = AdminGuard::new(Arc::clone(&kv), verifier, app_config.security.clone());

    let numbering = Arc::new(OrderNumbering::new(Arc::clone(&repo)));
    let desk = CheckoutDesk::new(
        Arc::clone(&repo),
        Arc::clone(&kv),
        Arc::clone(&numbering),
        app_config.ordering.clone(),
    );
    let admin = OrderAdmin::new(
        Arc::clone(&repo),
        Arc::clone(&kv),
        numbering,
        Arc::clone(&catalog),
        app_config.ordering.minimum_orders,
    );

    // 6. Start the retention scheduler
    let scheduler = Arc::new(RetentionScheduler::new(
        repo,
        kv,
        Arc::clone(&clock),
        app_config.retention.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let retention_task = Arc::clone(&scheduler).spawn(shutdown_rx);

    // 7. Run the bot
    // DISCORD_BOT_TOKEN is loaded here, directly before use, not stored in config
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    let data = BotData::new(app_config, catalog, clock, desk, admin, guard, scheduler);
    let result = bot::run_bot(token, data).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = retention_task.await {
        error!("Retention scheduler task failed: {}", e);
    }
    result
}
