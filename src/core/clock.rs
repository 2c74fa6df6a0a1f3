//! Time source and local-day arithmetic.
//!
//! Order days, the ordering window and the archival cutoff are all expressed in
//! the host's local time zone. Everything stored is UTC; these helpers are the
//! only place the two meet.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Local calendar day of an instant.
#[must_use]
pub fn local_day(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
}

/// Local wall-clock time of an instant.
#[must_use]
pub fn local_time(instant: DateTime<Utc>) -> NaiveTime {
    instant.with_timezone(&Local).time()
}

/// The UTC instant of a local wall-clock time on `day`.
///
/// Ambiguous times resolve to the earlier instant; times skipped by a DST jump
/// are read as UTC.
#[must_use]
pub fn local_instant(day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = day.and_time(time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| Utc.from_utc_datetime(&naive), |t| t.with_timezone(&Utc))
}

/// `[start, end)` of a local day as UTC instants.
#[must_use]
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_instant(day, NaiveTime::MIN);
    let end = day
        .succ_opt()
        .map_or(start + chrono::Duration::days(1), |next| {
            local_instant(next, NaiveTime::MIN)
        });
    (start, end)
}
