//! Day-scoped order numbering.
//!
//! Numbers are proposed optimistically from the day's current maximum and
//! written in one batch. The `(order_day, order_number)` unique index turns a
//! race with another writer into `Error::NumberConflict`, which is retried with
//! a fresh maximum. [`OrderNumbering::resequence`] then restores the canonical
//! `1..=N` numbering by creation time.

use crate::core::retry::RetryPolicy;
use crate::errors::{Error, Result};
use crate::models::{NewOrder, Order};
use crate::repository::{OrderFilter, OrderRepository, OrderSort};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Upper bound on the maximum-number read before falling back to the last
/// known counter.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Assigns and repairs order numbers.
pub struct OrderNumbering {
    repo: Arc<dyn OrderRepository>,
    policy: RetryPolicy,
    read_timeout: Duration,
    last_known: Mutex<Option<(NaiveDate, i32)>>,
}

impl OrderNumbering {
    /// Numbering over `repo` with the default retry policy and read timeout.
    #[must_use]
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self {
            repo,
            policy: RetryPolicy::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            last_known: Mutex::new(None),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the maximum-number read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Highest number seen for `day` by this process, if any.
    pub async fn last_known(&self, day: NaiveDate) -> Option<i32> {
        match *self.last_known.lock().await {
            Some((known_day, number)) if known_day == day => Some(number),
            _ => None,
        }
    }

    async fn remember(&self, day: NaiveDate, number: i32) {
        let mut guard = self.last_known.lock().await;
        let keep = matches!(*guard, Some((known_day, known)) if known_day == day && known >= number);
        if !keep {
            *guard = Some((day, number));
        }
    }

    /// Current maximum order number for `day`.
    ///
    /// A failed or slow read falls back to the last known counter for the day
    /// (or 0). A stale fallback can only cause a conflict, which the caller
    /// retries.
    async fn current_max(&self, day: NaiveDate) -> i32 {
        let filter = OrderFilter::for_day(day);
        let read = self
            .repo
            .query_orders(&filter, OrderSort::NumberDesc, Some(1));
        let fallback = match tokio::time::timeout(self.read_timeout, read).await {
            Ok(Ok(rows)) => {
                let max = rows.first().map_or(0, |o| o.order_number.max(0));
                self.remember(day, max).await;
                return max;
            }
            Ok(Err(err)) => format!("read failed: {err}"),
            Err(_) => format!("read timed out after {:?}", self.read_timeout),
        };

        let known = self.last_known(day).await.unwrap_or(0);
        warn!(
            "Order number {} for {}; using last known counter {}",
            fallback, day, known
        );
        known
    }

    /// Numbers `rows` consecutively after the day's current maximum and
    /// inserts them as one batch.
    ///
    /// The batch is all-or-nothing. On a number conflict the maximum is
    /// re-read and the whole batch retried with jittered backoff.
    ///
    /// # Errors
    /// `Error::ConflictExhausted` when every attempt conflicted; any other
    /// repository error as-is.
    #[instrument(skip(self, rows), fields(count = rows.len()))]
    pub async fn reserve_next_numbers(
        &self,
        day: NaiveDate,
        rows: Vec<NewOrder>,
    ) -> Result<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let attempts = self.policy.max_attempts.max(1);
        let rows = &rows;
        let inserted = self
            .policy
            .run(
                "order number reservation",
                |err| matches!(err, Error::NumberConflict),
                |attempt| async move {
                    let start = self.current_max(day).await + 1;
                    debug!("Attempt {} proposes numbers from {}", attempt, start);
                    let numbered: Vec<NewOrder> = rows
                        .iter()
                        .cloned()
                        .zip(start..)
                        .map(|(mut row, number)| {
                            row.order_day = day;
                            row.order_number = number;
                            row
                        })
                        .collect();
                    self.repo.insert_orders(numbered).await
                },
            )
            .await
            .map_err(|err| match err {
                Error::NumberConflict => Error::ConflictExhausted { attempts },
                other => other,
            })?;

        if let Some(max) = inserted.iter().map(|o| o.order_number).max() {
            self.remember(day, max).await;
        }
        info!(
            "Reserved {} order numbers for {}",
            inserted.len(),
            day
        );
        Ok(inserted)
    }

    /// Renumbers `day` to `1..=N` by creation time, writing only rows whose
    /// number changes. Returns how many rows moved.
    ///
    /// Safe to repeat: the result depends only on creation order.
    #[instrument(skip(self))]
    pub async fn resequence(&self, day: NaiveDate) -> Result<usize> {
        let orders = self
            .repo
            .query_orders(&OrderFilter::for_day(day), OrderSort::CreatedAsc, None)
            .await?;
        let changes = canonical_changes(&orders);

        if changes.is_empty() {
            debug!("Numbering for {} already canonical", day);
        } else {
            self.repo.renumber_orders(&changes).await?;
            info!("Resequenced {} orders for {}", changes.len(), day);
        }

        let count = i32::try_from(orders.len()).unwrap_or(i32::MAX);
        *self.last_known.lock().await = Some((day, count));
        Ok(changes.len())
    }
}

/// `(id, number)` pairs needed to bring `orders` (oldest first) to `1..=N`.
fn canonical_changes(orders: &[Order]) -> Vec<(i64, i32)> {
    orders
        .iter()
        .zip(1..)
        .filter(|(order, number)| order.order_number != *number)
        .map(|(order, number)| (order.id, number))
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use std::sync::atomic::Ordering;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    }

    fn drafts(names: &[&str], minute: u32) -> Vec<NewOrder> {
        names
            .iter()
            .map(|name| new_order(day(), 0, name, at(day(), 9, minute)))
            .collect()
    }

    async fn numbers(repo: &dyn OrderRepository) -> Vec<(String, i32)> {
        repo.query_orders(&OrderFilter::for_day(day()), OrderSort::CreatedAsc, None)
            .await
            .unwrap()
            .into_iter()
            .map(|o| (o.customer_name, o.order_number))
            .collect()
    }

    #[tokio::test]
    async fn test_numbers_continue_from_current_max() -> Result<()> {
        let store = Arc::new(setup_test_store().await?);
        let numbering = OrderNumbering::new(Arc::clone(&store) as Arc<dyn OrderRepository>)
            .with_policy(RetryPolicy::immediate(3));

        let first = numbering
            .reserve_next_numbers(day(), drafts(&["Ana", "Ana"], 0))
            .await?;
        assert_eq!(
            first.iter().map(|o| o.order_number).collect::<Vec<_>>(),
            vec![1, 2]
        );

        let second = numbering
            .reserve_next_numbers(day(), drafts(&["Ben"], 5))
            .await?;
        assert_eq!(second[0].order_number, 3);
        assert_eq!(numbering.last_known(day()).await, Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_conflict_rereads_max_and_retries() -> Result<()> {
        init_test_tracing();
        let repo = Arc::new(FaultyRepository::new(setup_test_store().await?));
        repo.rival_on_next_insert.store(true, Ordering::SeqCst);
        let numbering = OrderNumbering::new(Arc::clone(&repo) as Arc<dyn OrderRepository>)
            .with_policy(RetryPolicy::immediate(3));

        let inserted = numbering
            .reserve_next_numbers(day(), drafts(&["Ana", "Ana"], 10))
            .await?;

        // The rival took number 1 between our read and our write
        assert_eq!(
            inserted.iter().map(|o| o.order_number).collect::<Vec<_>>(),
            vec![2, 3]
        );
        assert_eq!(repo.insert_calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_conflicts_leave_nothing_behind() -> Result<()> {
        let repo = Arc::new(FaultyRepository::new(setup_test_store().await?));
        repo.forced_conflicts.store(10, Ordering::SeqCst);
        let numbering = OrderNumbering::new(Arc::clone(&repo) as Arc<dyn OrderRepository>)
            .with_policy(RetryPolicy::immediate(3));

        let result = numbering
            .reserve_next_numbers(day(), drafts(&["Ana", "Ana"], 0))
            .await;

        assert!(matches!(result, Err(Error::ConflictExhausted { attempts: 3 })));
        assert_eq!(repo.insert_calls.load(Ordering::SeqCst), 3);
        assert!(numbers(repo.as_ref()).await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_slow_max_read_falls_back_to_last_known() -> Result<()> {
        let repo = Arc::new(FaultyRepository::new(setup_test_store().await?));
        let numbering = OrderNumbering::new(Arc::clone(&repo) as Arc<dyn OrderRepository>)
            .with_policy(RetryPolicy::immediate(3))
            .with_read_timeout(Duration::from_millis(50));

        numbering
            .reserve_next_numbers(day(), drafts(&["Ana", "Ben"], 0))
            .await?;

        repo.set_read_delay(Some(Duration::from_millis(500))).await;
        let inserted = numbering
            .reserve_next_numbers(day(), drafts(&["Cy"], 5))
            .await?;
        assert_eq!(inserted[0].order_number, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_max_read_without_history_starts_at_one() -> Result<()> {
        let repo = Arc::new(FaultyRepository::new(setup_test_store().await?));
        repo.fail_reads.store(true, Ordering::SeqCst);
        let numbering = OrderNumbering::new(Arc::clone(&repo) as Arc<dyn OrderRepository>)
            .with_policy(RetryPolicy::immediate(3));

        let inserted = numbering
            .reserve_next_numbers(day(), drafts(&["Ana"], 0))
            .await?;
        assert_eq!(inserted[0].order_number, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_resequence_closes_gaps_and_is_idempotent() -> Result<()> {
        let store = Arc::new(setup_test_store().await?);
        store
            .insert_orders(vec![
                new_order(day(), 7, "Cy", at(day(), 11, 0)),
                new_order(day(), 2, "Ana", at(day(), 9, 0)),
                new_order(day(), 4, "Ben", at(day(), 10, 0)),
            ])
            .await?;
        let numbering = OrderNumbering::new(Arc::clone(&store) as Arc<dyn OrderRepository>);

        let moved = numbering.resequence(day()).await?;
        assert_eq!(moved, 3);
        let after_first = numbers(store.as_ref()).await;
        assert_eq!(
            after_first,
            vec![
                ("Ana".to_string(), 1),
                ("Ben".to_string(), 2),
                ("Cy".to_string(), 3)
            ]
        );

        assert_eq!(numbering.resequence(day()).await?, 0);
        assert_eq!(numbers(store.as_ref()).await, after_first);
        Ok(())
    }

    #[tokio::test]
    async fn test_resequence_after_inserts_and_deletes_is_gapless() -> Result<()> {
        let store = Arc::new(setup_test_store().await?);
        let numbering = OrderNumbering::new(Arc::clone(&store) as Arc<dyn OrderRepository>)
            .with_policy(RetryPolicy::immediate(3));

        let mut ids = Vec::new();
        for (minute, name) in ["Ana", "Ben", "Cy", "Dee", "Eve", "Fay"].iter().enumerate() {
            let inserted = numbering
                .reserve_next_numbers(
                    day(),
                    drafts(&[*name], u32::try_from(minute).unwrap()),
                )
                .await?;
            ids.push(inserted[0].id);
        }
        store.delete_orders(&OrderFilter::by_id(ids[1])).await?;
        store.delete_orders(&OrderFilter::by_id(ids[4])).await?;

        numbering.resequence(day()).await?;
        let numbered: Vec<i32> = numbers(store.as_ref())
            .await
            .into_iter()
            .map(|(_, n)| n)
            .collect();
        assert_eq!(numbered, vec![1, 2, 3, 4]);
        Ok(())
    }

    #[tokio::test]
    async fn test_resequence_only_touches_its_day() -> Result<()> {
        let store = Arc::new(setup_test_store().await?);
        let other = day().succ_opt().unwrap();
        store
            .insert_orders(vec![
                new_order(day(), 5, "Ana", at(day(), 9, 0)),
                new_order(other, 9, "Ben", at(other, 9, 0)),
            ])
            .await?;

        OrderNumbering::new(Arc::clone(&store) as Arc<dyn OrderRepository>)
            .resequence(day())
            .await?;

        let tomorrow = store
            .query_orders(&OrderFilter::for_day(other), OrderSort::NumberAsc, None)
            .await?;
        assert_eq!(tomorrow[0].order_number, 9);
        Ok(())
    }

    #[test]
    fn test_canonical_changes_skips_rows_already_in_place() {
        let orders: Vec<Order> = [(10, 1), (11, 3), (12, 3)]
            .into_iter()
            .map(|(id, number)| sample_order(id, number))
            .collect();
        assert_eq!(canonical_changes(&orders), vec![(11, 2)]);
    }
}
