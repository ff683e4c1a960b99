//! Retry with exponential backoff for REST fetches.

use crate::error::FeedError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff policy: `base_delay * 2^attempt` between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default: 3).
    pub max_retries: u32,
    /// Delay before the first retry (default: 1s).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay after the failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Cap the power to prevent overflow
        let factor = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(factor)
    }
}

/// Run `op` until it succeeds, fails permanently, or retries run out.
///
/// Only [`FeedError::is_transient`] errors are retried, waiting at least
/// [`FeedError::suggested_retry_delay`]. The last error is returned.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, FeedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FeedError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                // Rate limits ask for a longer pause than the backoff step
                let delay = policy
                    .delay_for(attempt)
                    .max(e.suggested_retry_delay().unwrap_or_default());
                warn!(
                    "{}: attempt {}/{} failed: {}. Retrying in {}ms",
                    label,
                    attempt + 1,
                    policy.max_retries + 1,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = with_retry(&RetryPolicy::default(), "test", || async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(FeedError::Timeout("slow".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "test", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FeedError::ConnectionFailed("refused".into()))
        })
        .await;

        assert!(matches!(result, Err(FeedError::ConnectionFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_suggested_delay() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let started = tokio::time::Instant::now();
        let result = with_retry(&RetryPolicy::default(), "test", || async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FeedError::RateLimitExceeded)
            } else {
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_step_wins_when_longer() {
        let policy = RetryPolicy::new(1, Duration::from_secs(30));
        let started = tokio::time::Instant::now();
        let result: Result<(), _> = with_retry(&policy, "test", || async {
            Err(FeedError::Timeout("slow".into()))
        })
        .await;

        assert!(matches!(result, Err(FeedError::Timeout(_))));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(30));
        assert!(waited < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_fast() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = with_retry(&RetryPolicy::default(), "test", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(FeedError::ParseError("bad".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
