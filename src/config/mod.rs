/// Application configuration loading from config.toml
pub mod app;

/// Database configuration and connection management
pub mod database;

/// Menu and topping catalogs
pub mod menu;

/// Secrets and locations from environment variables
pub mod settings;

pub use app::{AppConfig, OrderingConfig, RetentionConfig, SecurityConfig, load_config};
pub use menu::MenuCatalog;
pub use settings::Settings;
