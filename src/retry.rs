//! Retry logic for disk operations.
//!
//! Disk hiccups (a file briefly in use, a directory listing racing a
//! delete) are retried with a short exponential backoff. The two presets
//! match the store's retry classes: per-document saves give up quickly so
//! the scheduler can move on, structural operations (definitions, listings,
//! deletes, wipes) try harder before surfacing an error.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub(crate) struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    pub max_attempts: usize,
}

impl RetryConfig {
    /// Per-document saves: 3 attempts, fast. On exhaustion the write is
    /// dropped and logged rather than blocking the write-back pass.
    #[must_use]
    pub fn document() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(200),
            factor: 2.0,
        }
    }

    /// Structural operations (collection definitions, listings, deletes,
    /// wipes): 10 attempts before giving up.
    #[must_use]
    pub fn structural() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(1),
            factor: 2.0,
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            factor: 2.0,
        }
    }
}

pub(crate) async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempts > 0 {
                    info!(
                        operation = operation_name,
                        attempts,
                        "operation succeeded after retries"
                    );
                }
                return Ok(value);
            }
            Err(error) => {
                attempts += 1;

                if attempts >= config.max_attempts {
                    return Err(error);
                }

                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    max_attempts = config.max_attempts,
                    error = %error,
                    retry_in = ?delay,
                    "operation failed, retrying"
                );

                sleep(delay).await;
                delay = delay.mul_f64(config.factor).min(config.max_delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct TestError(String);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let result: Result<i32, TestError> =
            retry("op", &RetryConfig::test(), || async { Ok(42) }).await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result: Result<i32, TestError> = retry("op", &RetryConfig::test(), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
                    Err(TestError("transient".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result: Result<i32, TestError> = retry("op", &RetryConfig::test(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TestError("always".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_presets() {
        assert_eq!(RetryConfig::document().max_attempts, 3);
        assert_eq!(RetryConfig::structural().max_attempts, 10);
    }

    #[test]
    fn test_delay_caps_at_max() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            factor: 10.0,
            max_attempts: 5,
        };

        let delay = config.initial_delay.mul_f64(config.factor).min(config.max_delay);
        assert_eq!(delay, Duration::from_millis(300));
    }
}
