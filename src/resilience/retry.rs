//! # Fibonacci Retry
//!
//! Bounded retries with Fibonacci-spaced delays (`1, 1, 2, 3, 5, ...` times
//! the base delay), gated on the error class of each failure.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{GatewayError, GatewayResult};

/// Error classes that trigger another attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOn {
    /// Upstream 4xx/5xx responses
    RemoteService,
    /// Unexpected failures such as unfinished jobs or non-200 creation answers
    Unhandled,
    /// Identity broker rejections
    TokenExchange,
}

impl RetryOn {
    pub fn matches(&self, error: &GatewayError) -> bool {
        match self {
            RetryOn::RemoteService => matches!(error, GatewayError::RemoteService { .. }),
            RetryOn::Unhandled => matches!(error, GatewayError::Unhandled(_)),
            RetryOn::TokenExchange => matches!(error, GatewayError::TokenExchangeFailed(_)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy for ordinary idempotent calls
    pub fn standard(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_millis(config.base_delay_ms))
    }

    /// Policy for collab job-status polling
    pub fn job_polling(config: &RetryConfig) -> Self {
        Self::new(
            config.job_status_max_attempts,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * fibonacci(retry)
    }

    /// Sum of every delay a permanently failing call would wait
    pub fn total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|retry| self.delay_for(retry)).sum()
    }
}

fn fibonacci(n: u32) -> u32 {
    let (mut previous, mut current) = (0u32, 1u32);
    for _ in 1..n {
        let next = previous.saturating_add(current);
        previous = current;
        current = next;
    }
    current
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempt cap is reached. The last error is returned as-is.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    retry_on: RetryOn,
    mut operation: F,
) -> GatewayResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GatewayResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Retried operation succeeded");
                }
                return Ok(value);
            }
            Err(error) if retry_on.matches(&error) && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                if attempt > 1 {
                    warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %error,
                        "Giving up"
                    );
                }
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_fibonacci_spacing() {
        let policy = RetryPolicy::new(6, Duration::from_secs(1));
        let delays: Vec<u64> = (1..6).map(|r| policy.delay_for(r).as_secs()).collect();
        assert_eq!(delays, vec![1, 1, 2, 3, 5]);
    }

    #[test]
    fn test_total_backoff_for_five_attempts() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        assert_eq!(policy.total_backoff(), Duration::from_secs(7));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.total_backoff(), Duration::ZERO);
    }

    #[test]
    fn test_retry_classes() {
        assert!(RetryOn::RemoteService.matches(&GatewayError::remote(502, "bad gateway")));
        assert!(!RetryOn::RemoteService.matches(&GatewayError::NotFound));
        assert!(RetryOn::Unhandled.matches(&GatewayError::unhandled("job pending")));
        assert!(RetryOn::TokenExchange.matches(&GatewayError::TokenExchangeFailed("x".into())));
        assert!(!RetryOn::TokenExchange.matches(&GatewayError::NoData));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_call_is_attempted_exactly_max_times() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let attempts = &AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: GatewayResult<()> =
            retry_with_backoff(&policy, "create_space", RetryOn::Unhandled, move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::unhandled("Could not create a space"))
            })
            .await;

        assert_eq!(result, Err(GatewayError::unhandled("Could not create a space")));
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        assert!(started.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_secs(1));
        let attempts = &AtomicU32::new(0);

        let result: GatewayResult<()> =
            retry_with_backoff(&policy, "add_user", RetryOn::RemoteService, move || async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::NotAvailable("timeout".into()))
            })
            .await;

        assert!(matches!(result, Err(GatewayError::NotAvailable(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let attempts = &AtomicU32::new(0);

        let result = retry_with_backoff(&policy, "job_status", RetryOn::Unhandled, move || async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(GatewayError::unhandled("not finished"))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
    }
}
