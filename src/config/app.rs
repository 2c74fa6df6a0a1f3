//! Application configuration loading from config.toml
//!
//! config.toml carries everything that is not a secret: the menu, the weekly
//! ordering window, retention timings and admin lockout thresholds. Sections
//! other than `[menu]` fall back to defaults when omitted.

use crate::config::menu::{MenuCatalog, MenuConfig};
use crate::errors::{Error, Result};
use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Deserializer};
use std::path::Path;
use std::time::Duration;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Menu and topping catalogs
    pub menu: MenuConfig,
    /// Weekly ordering window
    #[serde(default)]
    pub ordering: OrderingConfig,
    /// Purge and archival timings
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Admin lockout thresholds
    #[serde(default)]
    pub security: SecurityConfig,
}

impl AppConfig {
    /// Validates the menu section into a catalog.
    ///
    /// # Errors
    /// Returns `Error::Config` if the menu is inconsistent.
    pub fn catalog(&self) -> Result<MenuCatalog> {
        MenuCatalog::from_config(&self.menu)
    }
}

/// `[ordering]` section.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OrderingConfig {
    /// Days on which orders are collected
    pub days: Vec<Weekday>,
    /// Local time orders open
    #[serde(deserialize_with = "de_clock_time")]
    pub opens_at: NaiveTime,
    /// Local time orders close
    #[serde(deserialize_with = "de_clock_time")]
    pub closes_at: NaiveTime,
    /// Local time drinks are delivered
    #[serde(deserialize_with = "de_clock_time")]
    pub delivery_at: NaiveTime,
    /// Drinks needed for the group order to go ahead
    pub minimum_orders: u32,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            days: vec![Weekday::Tue, Weekday::Wed],
            opens_at: clock(8, 30),
            closes_at: clock(13, 30),
            delivery_at: clock(16, 45),
            minimum_orders: 20,
        }
    }
}

/// `[retention]` section.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RetentionConfig {
    /// Local time after which unpaid orders are archived
    #[serde(deserialize_with = "de_clock_time")]
    pub archive_cutoff: NaiveTime,
    /// How long an archival lease stays valid
    pub lease_ttl_minutes: u64,
    /// Interval between legacy purge checks
    pub purge_interval_minutes: u64,
    /// Interval between archival checks
    pub archive_check_interval_minutes: u64,
}

impl RetentionConfig {
    /// Lease time-to-live.
    #[must_use]
    pub fn lease_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::try_from(self.lease_ttl_minutes).unwrap_or(i64::MAX))
    }

    /// Purge check interval.
    #[must_use]
    pub const fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_minutes.saturating_mul(60))
    }

    /// Archival check interval.
    #[must_use]
    pub const fn archive_check_interval(&self) -> Duration {
        Duration::from_secs(self.archive_check_interval_minutes.saturating_mul(60))
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            archive_cutoff: clock(22, 0),
            lease_ttl_minutes: 5,
            purge_interval_minutes: 60,
            archive_check_interval_minutes: 5,
        }
    }
}

/// `[security]` section.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Consecutive failures before lockout
    pub max_login_attempts: u32,
    /// Lockout length in minutes
    pub lockout_minutes: i64,
    /// Timeout for the remote verification endpoint
    pub verify_timeout_seconds: u64,
}

impl SecurityConfig {
    /// Lockout length.
    #[must_use]
    pub fn lockout_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lockout_minutes)
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 3,
            lockout_minutes: 15,
            verify_timeout_seconds: 5,
        }
    }
}

fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn de_clock_time<'de, D>(deserializer: D) -> std::result::Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(serde::de::Error::custom)
}

/// Loads application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
/// - The menu fails validation
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })?;

    // Fail at startup rather than on the first order
    config.catalog()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const MINIMAL: &str = r#"
        [menu]
        toppings = []

        [[menu.categories]]
        name = "Milk Tea"
        price = 4.45
        flavors = ["Mango"]
    "#;

    #[test]
    fn test_defaults_apply_when_sections_missing() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.ordering, OrderingConfig::default());
        assert_eq!(config.retention.archive_cutoff, clock(22, 0));
        assert_eq!(config.security.max_login_attempts, 3);
        assert_eq!(config.security.lockout_duration(), chrono::Duration::minutes(15));
    }

    #[test]
    fn test_parse_custom_sections() {
        let toml_str = format!(
            r#"{MINIMAL}
            [ordering]
            days = ["Mon", "Fri"]
            opens_at = "09:00"
            closes_at = "12:15"
            delivery_at = "15:00"
            minimum_orders = 10

            [retention]
            archive_cutoff = "21:30"
            lease_ttl_minutes = 2
            "#
        );
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.ordering.days, vec![Weekday::Mon, Weekday::Fri]);
        assert_eq!(config.ordering.closes_at, clock(12, 15));
        assert_eq!(config.ordering.minimum_orders, 10);
        assert_eq!(config.retention.archive_cutoff, clock(21, 30));
        assert_eq!(config.retention.lease_ttl(), chrono::Duration::minutes(2));
        assert_eq!(config.retention.purge_interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_bad_clock_time_rejected() {
        let toml_str = format!(
            r#"{MINIMAL}
            [retention]
            archive_cutoff = "late"
            "#
        );
        assert!(toml::from_str::<AppConfig>(&toml_str).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("does/not/exist.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_repository_config_file_loads() {
        let config = load_config(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
        let catalog = config.catalog().unwrap();
        assert!(catalog.category("Milk Tea").is_some());
    }
}
