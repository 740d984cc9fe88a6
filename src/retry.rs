//! Retry with Exponential Backoff
//!
//! Generic retry wrapper shared by every source fetcher, so fetch code never
//! carries its own retry loop.

use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::errors::FetchError;

/// Errors that know whether another attempt is worthwhile
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        FetchError::is_retryable(self)
    }
}

/// Backoff configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failure; doubles on each further failure
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to each backoff
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// `base * 2^attempt`, capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is reached. Returns the last error.
pub async fn retry_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("'{}' succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                attempt += 1;
                if !e.is_retryable() || attempt >= max_attempts {
                    return Err(e);
                }
                let delay = policy.backoff(attempt - 1);
                warn!(
                    "'{}' failed (attempt {}/{}): {}, retrying in {:?}",
                    operation_name, attempt, max_attempts, e, delay
                );
                sleep(delay).await;
            }
        }
    }
}

/// Shorthand for `retry_with_policy` without jitter
pub async fn with_retry<T, E, F, Fut>(
    operation: F,
    max_attempts: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let policy = RetryPolicy::new(max_attempts, base_delay).with_jitter(Duration::ZERO);
    retry_with_policy(&policy, "operation", operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::source::SourceId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn transient() -> FetchError {
        FetchError::Timeout {
            source_id: SourceId::YahooFinance,
        }
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_secs(5))
            .with_max_delay(Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_bound() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100))
            .with_jitter(Duration::from_millis(50));
        for _ in 0..20 {
            let delay = policy.backoff(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempt_count = Arc::new(AtomicUsize::new(0));
        let counter = attempt_count.clone();

        let result: Result<u32, FetchError> = with_retry(
            || {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if count < 2 {
                        Err(transient())
                    } else {
                        Ok(42)
                    }
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_after_max_attempts() {
        let attempt_count = Arc::new(AtomicUsize::new(0));
        let counter = attempt_count.clone();

        let result: Result<(), FetchError> = with_retry(
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            },
            3,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(result.unwrap_err(), transient());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let attempt_count = Arc::new(AtomicUsize::new(0));
        let counter = attempt_count.clone();

        let result: Result<(), FetchError> = with_retry(
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(FetchError::NotFound {
                        source_id: SourceId::MiningFeeds,
                        ticker: "XYZ.TO".to_string(),
                    })
                }
            },
            5,
            Duration::from_millis(1),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let attempt_count = Arc::new(AtomicUsize::new(0));
        let counter = attempt_count.clone();

        let _: Result<(), FetchError> = with_retry(
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            },
            0,
            Duration::from_millis(1),
        )
        .await;

        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }
}
