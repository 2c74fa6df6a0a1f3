//! Weekly ordering window.

use crate::config::OrderingConfig;
use crate::core::clock::{local_day, local_time};
use crate::core::state;
use crate::errors::{Error, Result};
use crate::repository::KeyValueStore;
use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};

/// Where `now` falls relative to the ordering window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingStatus {
    /// Ordering day, before opening
    NotYetOpen {
        /// Opening time
        opens_at: NaiveTime,
    },
    /// Orders are being collected
    Open {
        /// Closing time
        closes_at: NaiveTime,
    },
    /// Ordering day, after closing
    Closed {
        /// Delivery time
        delivery_at: NaiveTime,
    },
    /// Not an ordering day
    OffDay,
}

impl OrderingStatus {
    /// True while orders are being collected.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

/// Window status for a UTC instant, evaluated in local time.
#[must_use]
pub fn ordering_status(config: &OrderingConfig, now: DateTime<Utc>) -> OrderingStatus {
    let weekday = local_day(now).weekday();
    if !config.days.contains(&weekday) {
        return OrderingStatus::OffDay;
    }

    let time = local_time(now);
    if time < config.opens_at {
        OrderingStatus::NotYetOpen {
            opens_at: config.opens_at,
        }
    } else if time < config.closes_at {
        OrderingStatus::Open {
            closes_at: config.closes_at,
        }
    } else {
        OrderingStatus::Closed {
            delivery_at: config.delivery_at,
        }
    }
}

/// `8:30 AM` style clock time.
#[must_use]
pub fn format_clock(time: NaiveTime) -> String {
    time.format("%-I:%M %p").to_string()
}

fn plural_day(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mondays",
        Weekday::Tue => "Tuesdays",
        Weekday::Wed => "Wednesdays",
        Weekday::Thu => "Thursdays",
        Weekday::Fri => "Fridays",
        Weekday::Sat => "Saturdays",
        Weekday::Sun => "Sundays",
    }
}

/// Human-readable status line.
#[must_use]
pub fn status_message(config: &OrderingConfig, status: OrderingStatus) -> String {
    match status {
        OrderingStatus::NotYetOpen { opens_at } => format!("Opening at {}", format_clock(opens_at)),
        OrderingStatus::Open { closes_at } => {
            format!("COLLECTING ORDERS - Closes {}", format_clock(closes_at))
        }
        OrderingStatus::Closed { delivery_at } => {
            format!("ORDERS CLOSED - Delivery at {}", format_clock(delivery_at))
        }
        OrderingStatus::OffDay => {
            let days: Vec<&str> = config.days.iter().map(|d| plural_day(*d)).collect();
            format!(
                "Orders open {} {} - {}",
                days.join(" & "),
                format_clock(config.opens_at),
                format_clock(config.closes_at)
            )
        }
    }
}

/// Rejects checkout outside the window while time restrictions are on.
///
/// # Errors
/// `Error::Validation` carrying the status message when ordering is closed.
pub async fn ensure_ordering_allowed(
    kv: &dyn KeyValueStore,
    config: &OrderingConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    if !state::time_restrictions_enabled(kv).await? {
        return Ok(());
    }
    let status = ordering_status(config, now);
    if status.is_open() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Ordering is currently closed. {}",
            status_message(config, status)
        )))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::{at, setup_test_store};
    use chrono::NaiveDate;

    // 2024-03-05 is a Tuesday
    fn tuesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_status_over_an_ordering_day() {
        let config = OrderingConfig::default();
        let day = tuesday();

        assert_eq!(
            ordering_status(&config, at(day, 8, 29)),
            OrderingStatus::NotYetOpen {
                opens_at: time(8, 30)
            }
        );
        assert_eq!(
            ordering_status(&config, at(day, 8, 30)),
            OrderingStatus::Open {
                closes_at: time(13, 30)
            }
        );
        assert_eq!(
            ordering_status(&config, at(day, 13, 30)),
            OrderingStatus::Closed {
                delivery_at: time(16, 45)
            }
        );
        let thursday = day.succ_opt().unwrap().succ_opt().unwrap();
        assert_eq!(ordering_status(&config, at(thursday, 10, 0)), OrderingStatus::OffDay);
    }

    #[test]
    fn test_messages() {
        let config = OrderingConfig::default();
        assert_eq!(
            status_message(&config, OrderingStatus::Open { closes_at: time(13, 30) }),
            "COLLECTING ORDERS - Closes 1:30 PM"
        );
        assert_eq!(
            status_message(&config, OrderingStatus::Closed { delivery_at: time(16, 45) }),
            "ORDERS CLOSED - Delivery at 4:45 PM"
        );
        assert_eq!(
            status_message(&config, OrderingStatus::OffDay),
            "Orders open Tuesdays & Wednesdays 8:30 AM - 1:30 PM"
        );
    }

    #[tokio::test]
    async fn test_window_only_enforced_when_enabled() -> Result<()> {
        let store = setup_test_store().await?;
        let config = OrderingConfig::default();
        let evening = at(tuesday(), 18, 0);

        ensure_ordering_allowed(&store, &config, evening).await?;

        state::set_time_restrictions(&store, true).await?;
        let result = ensure_ordering_allowed(&store, &config, evening).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        ensure_ordering_allowed(&store, &config, at(tuesday(), 10, 0)).await?;
        Ok(())
    }
}
