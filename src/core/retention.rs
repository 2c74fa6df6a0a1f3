//! Legacy purge and nightly archival of unpaid orders.
//!
//! Both policies are re-runnable from any number of processes. The purge is a
//! plain range delete. The archival sweep is gated by a per-day completion
//! marker and a short lease. It rewrites the day's archive range in one
//! transaction keyed by source order, so a lost lease costs duplicate work but
//! never duplicate records.

use crate::config::RetentionConfig;
use crate::core::clock::{Clock, day_bounds, local_day, local_time};
use crate::core::{lease, pricing, state};
use crate::errors::{Error, Result};
use crate::models::NewArchiveRecord;
use crate::repository::{ArchiveFilter, KeyValueStore, OrderFilter, OrderRepository, OrderSort};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

/// Prefix of the per-day completion marker.
pub const ARCHIVE_DONE_PREFIX: &str = "unpaid_archive_done";
/// Prefix of the per-day in-progress lease.
pub const ARCHIVE_LOCK_PREFIX: &str = "unpaid_archive_lock";

/// What started an archival sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveTrigger {
    /// Periodic check; honours the cutoff and the completion marker
    Timer,
    /// Admin request; runs at any time and leaves the marker alone
    Admin,
}

/// Result of one archival attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Local time has not reached the cutoff
    BeforeCutoff,
    /// Today's sweep already completed
    AlreadyDone,
    /// Another holder has the lease
    Busy,
    /// Sweep ran and wrote this many records
    Archived {
        /// Records written for the day
        records: usize,
    },
}

/// Deletes every order created before the start of the current local day.
#[instrument(skip(repo))]
pub async fn purge_legacy_orders(repo: &dyn OrderRepository, now: DateTime<Utc>) -> Result<u64> {
    let (today_start, _) = day_bounds(local_day(now));
    let deleted = repo
        .delete_orders(&OrderFilter {
            created_before: Some(today_start),
            ..OrderFilter::default()
        })
        .await?;
    if deleted > 0 {
        info!("Purged {} orders from previous days", deleted);
    } else {
        debug!("No legacy orders to purge");
    }
    Ok(deleted)
}

/// Archives today's picked-up but unpaid orders.
///
/// The lease is renewed before the archive write and released on every path
/// once taken. Losing it before the write skips the write. The completion
/// marker is written only after a successful timer-triggered sweep.
#[instrument(skip(repo, kv, config))]
pub async fn archive_unpaid_orders(
    repo: &dyn OrderRepository,
    kv: &dyn KeyValueStore,
    holder: &str,
    config: &RetentionConfig,
    now: DateTime<Utc>,
    trigger: ArchiveTrigger,
) -> Result<ArchiveOutcome> {
    let day = local_day(now);
    let done_key = state::day_key(ARCHIVE_DONE_PREFIX, day);

    if trigger == ArchiveTrigger::Timer {
        if local_time(now) < config.archive_cutoff {
            return Ok(ArchiveOutcome::BeforeCutoff);
        }
        if already_done(kv, &done_key, day).await? {
            debug!("Unpaid archival already done for {}", day);
            return Ok(ArchiveOutcome::AlreadyDone);
        }
    }

    let lock_key = state::day_key(ARCHIVE_LOCK_PREFIX, day);
    if !lease::acquire(kv, &lock_key, holder, config.lease_ttl(), now).await? {
        info!("Unpaid archival for {} is running elsewhere", day);
        return Ok(ArchiveOutcome::Busy);
    }

    let result = async {
        let rows = unpaid_records(repo, day, now).await?;
        // The read can outlast the lease; only write while still holding it
        if !lease::renew(kv, &lock_key, holder, config.lease_ttl(), now).await? {
            return Ok(None);
        }
        let written = repo.replace_archive(&day_window(day), rows).await?;
        if trigger == ArchiveTrigger::Timer {
            state::set_date(kv, &done_key, day).await?;
        }
        Ok::<_, Error>(Some(written.len()))
    }
    .await;

    if let Err(err) = lease::release(kv, &lock_key, holder).await {
        warn!("Failed to release archival lease for {}: {}", day, err);
    }

    let Some(records) = result? else {
        info!("Lost the archival lease for {} before writing", day);
        return Ok(ArchiveOutcome::Busy);
    };
    info!("Archived {} unpaid orders for {}", records, day);
    Ok(ArchiveOutcome::Archived { records })
}

/// True when the completion marker names `day`. An unreadable marker counts
/// as not done; the sweep is safe to repeat.
async fn already_done(kv: &dyn KeyValueStore, done_key: &str, day: NaiveDate) -> Result<bool> {
    match state::get_date(kv, done_key).await {
        Ok(marked) => Ok(marked == Some(day)),
        Err(Error::Config { message }) => {
            warn!("Ignoring archival marker: {}", message);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn day_window(day: NaiveDate) -> ArchiveFilter {
    let (start, end) = day_bounds(day);
    ArchiveFilter {
        order_from: Some(start),
        order_before: Some(end),
    }
}

/// Archive rows for the day's picked-up but unpaid orders, oldest first.
async fn unpaid_records(
    repo: &dyn OrderRepository,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Vec<NewArchiveRecord>> {
    let (start, end) = day_bounds(day);
    let qualifying = repo
        .query_orders(
            &OrderFilter {
                created_from: Some(start),
                created_before: Some(end),
                paid: Some(false),
                picked_up: Some(true),
                ..OrderFilter::default()
            },
            OrderSort::CreatedAsc,
            None,
        )
        .await?;

    Ok(qualifying
        .iter()
        .map(|order| NewArchiveRecord {
            source_order_id: order.id,
            customer_name: order.customer_name.clone(),
            amount: pricing::with_tax(order.price),
            order_timestamp: order.created_at,
            details: order.describe(),
            archived_at: now,
        })
        .collect())
}

/// Runs both policies on timers.
pub struct RetentionScheduler {
    repo: Arc<dyn OrderRepository>,
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: RetentionConfig,
    holder: String,
}

impl RetentionScheduler {
    /// Creates a scheduler with a fresh lease holder id.
    #[must_use]
    pub fn new(
        repo: Arc<dyn OrderRepository>,
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            repo,
            kv,
            clock,
            config,
            holder: lease::new_holder_id(),
        }
    }

    /// Lease holder id used by this scheduler.
    #[must_use]
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// One purge check. Failures are logged.
    pub async fn purge_once(&self) {
        if let Err(err) = purge_legacy_orders(self.repo.as_ref(), self.clock.now()).await {
            error!("Legacy order purge failed: {}", err);
        }
    }

    /// One archival check. Failures are logged.
    pub async fn archive_once(&self) {
        if let Err(err) = self.archive(ArchiveTrigger::Timer).await {
            error!("Unpaid order archival failed: {}", err);
        }
    }

    /// Runs a sweep now on behalf of an admin or the timer.
    pub async fn archive(&self, trigger: ArchiveTrigger) -> Result<ArchiveOutcome> {
        archive_unpaid_orders(
            self.repo.as_ref(),
            self.kv.as_ref(),
            &self.holder,
            &self.config,
            self.clock.now(),
            trigger,
        )
        .await
    }

    /// Purge check followed by archival check.
    pub async fn run_once(&self) {
        self.purge_once().await;
        self.archive_once().await;
    }

    /// Runs both checks immediately and then on their intervals until
    /// `shutdown` turns true or its sender is dropped.
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut purge = tokio::time::interval(at_least_one_second(self.config.purge_interval()));
            let mut archive =
                tokio::time::interval(at_least_one_second(self.config.archive_check_interval()));
            purge.set_missed_tick_behavior(MissedTickBehavior::Delay);
            archive.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                "Retention scheduler started (purge every {:?}, archival check every {:?})",
                purge.period(),
                archive.period()
            );
            loop {
                tokio::select! {
                    _ = purge.tick() => self.purge_once().await,
                    _ = archive.tick() => self.archive_once().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Retention scheduler stopped");
        })
    }
}

fn at_least_one_second(interval: Duration) -> Duration {
    interval.max(Duration::from_secs(1))
}
