//! Bounded retry with jittered backoff.

use crate::errors::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// How long to wait before a given retry.
pub trait BackoffPolicy {
    /// Delay before attempt `attempt` (the first retry is attempt 2).
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

/// Attempt budget plus a uniformly random delay between `min_backoff` and
/// `max_backoff`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Lower jitter bound
    pub min_backoff: Duration,
    /// Upper jitter bound
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(300),
        }
    }
}

impl BackoffPolicy for RetryPolicy {
    fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        if self.max_backoff <= self.min_backoff {
            return self.min_backoff;
        }
        let min = u64::try_from(self.min_backoff.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

impl RetryPolicy {
    /// A policy that retries without sleeping.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Runs `operation` until it succeeds, fails with an error `is_retryable`
    /// rejects, or the attempt budget is spent. The last error is returned.
    ///
    /// `operation` receives the 1-based attempt number.
    pub async fn run<T, F, Fut, P>(&self, label: &str, is_retryable: P, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&Error) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", label, attempt);
                    }
                    return Ok(value);
                }
                Err(err) if attempt < max_attempts && is_retryable(&err) => {
                    let delay = self.delay_for_attempt(attempt + 1);
                    warn!(
                        "{} failed on attempt {}/{}: {}; retrying in {:?}",
                        label, attempt, max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_jitter_stays_in_bounds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        for attempt in 2..50 {
            let delay = policy.delay_for_attempt(attempt);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() -> Result<()> {
        let calls = AtomicU32::new(0);
        let value = RetryPolicy::immediate(3)
            .run("test", Error::is_retryable, |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Error::NumberConflict)
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await?;

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::immediate(3)
            .run("test", Error::is_retryable, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::NumberConflict) }
            })
            .await;

        assert!(matches!(result, Err(Error::NumberConflict)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = RetryPolicy::immediate(3)
            .run("test", Error::is_retryable, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::validation("bad input")) }
            })
            .await;

        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
