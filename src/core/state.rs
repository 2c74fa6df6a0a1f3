//! Small persisted flags.
//!
//! Stored through [`KeyValueStore`] as strings, the same way the schema keeps
//! all process-wide state in one table.

use crate::errors::{Error, Result};
use crate::repository::KeyValueStore;
use chrono::NaiveDate;
use tracing::info;

/// Key of the ordering-window enforcement toggle.
pub const TIME_RESTRICTIONS_KEY: &str = "time_restrictions_enabled";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Whether checkout is limited to the ordering window. Off unless set.
pub async fn time_restrictions_enabled(kv: &dyn KeyValueStore) -> Result<bool> {
    Ok(kv
        .get_value(TIME_RESTRICTIONS_KEY)
        .await?
        .is_some_and(|v| v.trim() == "true"))
}

/// Turns ordering-window enforcement on or off.
pub async fn set_time_restrictions(kv: &dyn KeyValueStore, enabled: bool) -> Result<()> {
    kv.set_value(TIME_RESTRICTIONS_KEY, if enabled { "true" } else { "false" })
        .await?;
    info!("Time restrictions {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

/// Key for a marker scoped to one day, e.g. `unpaid_archive_done:2024-03-05`.
#[must_use]
pub fn day_key(prefix: &str, day: NaiveDate) -> String {
    format!("{prefix}:{}", day.format(DATE_FORMAT))
}

/// Reads a stored date.
///
/// # Errors
/// Returns `Error::Config` if the stored value is not a `YYYY-MM-DD` date.
pub async fn get_date(kv: &dyn KeyValueStore, key: &str) -> Result<Option<NaiveDate>> {
    match kv.get_value(key).await? {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .map(Some)
            .map_err(|e| Error::Config {
                message: format!("Failed to parse stored date for '{key}': {e}"),
            }),
        None => Ok(None),
    }
}

/// Stores a date.
pub async fn set_date(kv: &dyn KeyValueStore, key: &str, day: NaiveDate) -> Result<()> {
    kv.set_value(key, &day.format(DATE_FORMAT).to_string()).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::setup_test_store;

    #[tokio::test]
    async fn test_time_restrictions_default_off() -> Result<()> {
        let store = setup_test_store().await?;
        assert!(!time_restrictions_enabled(&store).await?);

        set_time_restrictions(&store, true).await?;
        assert!(time_restrictions_enabled(&store).await?);

        set_time_restrictions(&store, false).await?;
        assert!(!time_restrictions_enabled(&store).await?);
        Ok(())
    }

    #[tokio::test]
    async fn test_date_round_trip() -> Result<()> {
        let store = setup_test_store().await?;
        let day = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let key = day_key("unpaid_archive_done", day);
        assert_eq!(key, "unpaid_archive_done:2024-03-05");

        assert_eq!(get_date(&store, &key).await?, None);
        set_date(&store, &key, day).await?;
        assert_eq!(get_date(&store, &key).await?, Some(day));
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_date_is_config_error() -> Result<()> {
        let store = setup_test_store().await?;
        store.set_value("marker", "yesterday").await?;
        assert!(matches!(
            get_date(&store, "marker").await,
            Err(Error::Config { .. })
        ));
        Ok(())
    }
}
