// src/error_recovery.rs
//! Bounded retry with exponential backoff for the non-proxied lookups
//! (minute quotes, trading calendar).

use crate::constants::{
    QUOTE_RETRY_ATTEMPTS, QUOTE_RETRY_INITIAL_DELAY_SECS, QUOTE_RETRY_MAX_DELAY_SECS,
};
use crate::error::AppError;
use std::future::Future;
use std::time::Duration;

/// How often, and how patiently, an operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: QUOTE_RETRY_ATTEMPTS,
            initial_delay: Duration::from_secs(QUOTE_RETRY_INITIAL_DELAY_SECS),
            max_delay: Duration::from_secs(QUOTE_RETRY_MAX_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts. Used by tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `attempt + 1`, doubling up to `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

/// Retries `operation` while it fails with a transient error.
///
/// Permanent errors (see [`AppError::is_transient`]) are returned at once.
pub async fn retry_with_backoff<F, T, Fut>(
    what: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                if attempt < policy.max_attempts {
                    let delay = policy.delay_after(attempt);
                    log::warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        what,
                        attempt,
                        policy.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AppError::InternalError {
        message: format!("{} was never attempted", what),
        source: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(10));
        assert_eq!(policy.delay_after(2), Duration::from_secs(20));
        assert_eq!(policy.delay_after(4), Duration::from_secs(80));
        assert_eq!(policy.delay_after(6), Duration::from_secs(160));
        assert_eq!(policy.delay_after(40), Duration::from_secs(160));
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("quotes", RetryPolicy::immediate(3), || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::UpstreamStatus {
                    url: "http://quotes.test".into(),
                    status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                })
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_stop_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_with_backoff("quotes", RetryPolicy::immediate(5), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::UpstreamStatus {
                    url: "http://quotes.test".into(),
                    status: reqwest::StatusCode::NOT_FOUND,
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::UpstreamStatus { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_with_backoff("quotes", RetryPolicy::immediate(4), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::UpstreamStatus {
                    url: "http://quotes.test".into(),
                    status: reqwest::StatusCode::BAD_GATEWAY,
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
