//! Bounded retry for fragment store adapters
//!
//! Remote-store calls are retried with a fixed delay, and only when the
//! failure is classified as transient (connection reset, unreachable host,
//! DNS failure, timeout). Anything else fails on the first attempt.

use backoff::backoff::{Backoff, Constant};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Default number of attempts for remote-store operations
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default fixed delay between attempts
pub const DEFAULT_DELAY: Duration = Duration::from_secs(2);

/// Outcome of a retried operation that did not succeed
#[derive(Error, Debug)]
pub enum RetryError<E>
where
    E: fmt::Debug + fmt::Display,
{
    #[error("Operation '{operation}' exceeded maximum retry attempts ({attempts}): {error}")]
    MaxRetriesExceeded {
        operation: &'static str,
        attempts: usize,
        error: E,
    },
    #[error("Permanent error in '{operation}': {error}")]
    Permanent { operation: &'static str, error: E },
}

/// Result type for retry operations
pub type RetryResult<T, E> = std::result::Result<T, RetryError<E>>;

/// Trait for categorizing errors as transient or permanent
pub trait RetryableError {
    /// Returns true if the error is transient and the operation should be retried
    fn is_transient(&self) -> bool;

    /// Returns true if the error is permanent and retries should stop
    fn is_permanent(&self) -> bool {
        !self.is_transient()
    }
}

/// Attempt budget and fixed delay for a retried operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Single attempt, no delay
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Worst-case time spent sleeping between attempts
    pub fn total_delay(&self) -> Duration {
        self.delay * (self.max_attempts.saturating_sub(1) as u32)
    }

    fn backoff(&self) -> Constant {
        Constant::new(self.delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_DELAY)
    }
}

/// Execute an operation, retrying transient failures with a fixed delay
///
/// The closure receives the 1-based attempt number.
pub async fn with_retry<F, Fut, T, E>(
    op_name: &'static str,
    policy: &RetryPolicy,
    mut f: F,
) -> RetryResult<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + fmt::Debug + fmt::Display,
{
    let mut backoff = policy.backoff();
    let mut attempt = 1;

    loop {
        debug!(operation = op_name, attempt, "Attempting operation");

        match f(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = op_name,
                        attempts = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(error) if error.is_permanent() => {
                warn!(
                    operation = op_name,
                    attempt,
                    error = %error,
                    "Operation failed permanently"
                );
                return Err(RetryError::Permanent {
                    operation: op_name,
                    error,
                });
            }
            Err(error) => {
                if attempt >= policy.max_attempts {
                    warn!(
                        operation = op_name,
                        attempts = attempt,
                        error = %error,
                        "Operation exhausted retry attempts"
                    );
                    return Err(RetryError::MaxRetriesExceeded {
                        operation: op_name,
                        attempts: attempt,
                        error,
                    });
                }

                let delay = backoff.next_backoff().unwrap_or(policy.delay);
                warn!(
                    operation = op_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient failure, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(feature = "async-rt")]
async fn sleep(delay: Duration) {
    tokio::time::sleep(delay).await;
}

#[cfg(not(feature = "async-rt"))]
async fn sleep(delay: Duration) {
    std::thread::sleep(delay);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error("connection reset")]
        Reset,
        #[error("bad request")]
        BadRequest,
    }

    impl RetryableError for TestError {
        fn is_transient(&self) -> bool {
            matches!(self, TestError::Reset)
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_successful_operation() {
        let result: RetryResult<&str, TestError> =
            with_retry("test_op", &fast_policy(3), |_attempt| async { Ok("success") }).await;

        assert_eq!(result.unwrap(), "success");
    }

    #[tokio::test]
    async fn test_transient_failure_then_success() {
        let attempt_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempt_count);

        let result = with_retry("test_op", &fast_policy(5), move |_attempt| {
            let count = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if count < 2 {
                    Err(TestError::Reset)
                } else {
                    Ok("success")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempt_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let attempt_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempt_count);

        let result: RetryResult<(), TestError> = with_retry("test_op", &fast_policy(5), |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::BadRequest) }
        })
        .await;

        assert!(matches!(
            result,
            Err(RetryError::Permanent {
                error: TestError::BadRequest,
                ..
            })
        ));
        assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_budget_is_bounded() {
        let attempts_seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&attempts_seen);

        let result: RetryResult<(), TestError> = with_retry("test_op", &fast_policy(4), |attempt| {
            counter.store(attempt, Ordering::SeqCst);
            async { Err(TestError::Reset) }
        })
        .await;

        match result {
            Err(RetryError::MaxRetriesExceeded { attempts, error, .. }) => {
                assert_eq!(attempts, 4);
                assert!(matches!(error, TestError::Reset));
            }
            other => panic!("expected MaxRetriesExceeded, got {other:?}"),
        }
        assert_eq!(attempts_seen.load(Ordering::SeqCst), 4);
    }

    #[cfg(feature = "async-rt")]
    #[tokio::test(start_paused = true)]
    async fn test_fixed_delay_between_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        let start = tokio::time::Instant::now();

        let result: RetryResult<(), TestError> =
            with_retry("test_op", &policy, |_| async { Err(TestError::Reset) }).await;

        assert!(matches!(result, Err(RetryError::MaxRetriesExceeded { attempts: 3, .. })));
        let elapsed = start.elapsed();
        assert!(elapsed >= policy.total_delay());
        assert!(elapsed < policy.total_delay() + Duration::from_secs(1));
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_secs(2));
        assert_eq!(policy.total_delay(), Duration::from_secs(8));
    }

    #[test]
    fn test_policy_never_allows_zero_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::no_retry().total_delay(), Duration::ZERO);
    }

    #[test]
    fn test_retry_error_display_names_operation() {
        let err: RetryError<TestError> = RetryError::Permanent {
            operation: "put_item",
            error: TestError::BadRequest,
        };
        assert_eq!(err.to_string(), "Permanent error in 'put_item': bad request");
    }
}
