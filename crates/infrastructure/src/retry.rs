//! Retry with exponential backoff
//!
//! Used for idempotent helpdesk reads (contact search/filter, conversation
//! lookups). Creates and message sends are never retried here: a retried
//! create after a lost response would duplicate the remote record.

use std::{future::Future, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for retry behavior with exponential backoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Initial delay before first retry in milliseconds (default: 100ms)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds (default: 2000ms)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Jitter factor (0.0 to 1.0, default: 0.1 = 10%); 0 disables jitter
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

const fn default_initial_delay() -> u64 {
    100
}

const fn default_max_delay() -> u64 {
    2_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_max_retries() -> u32 {
    2
}

const fn default_jitter_factor() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            multiplier: default_multiplier(),
            max_retries: default_max_retries(),
            jitter_factor: default_jitter_factor(),
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub const fn new(initial_delay_ms: u64, max_delay_ms: u64, max_retries: u32) -> Self {
        Self {
            initial_delay_ms,
            max_delay_ms,
            multiplier: 2.0,
            max_retries,
            jitter_factor: 0.1,
        }
    }

    /// A single attempt, no retries
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(0, 0, 0)
    }

    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// Delay before retry number `attempt` (0-indexed)
    ///
    /// `initial_delay * multiplier^attempt`, capped at `max_delay`, plus or
    /// minus `jitter_factor` of the capped value.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = (self.initial_delay_ms as f64) * self.multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        let final_delay = if self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor.min(1.0);
            let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
            (capped_delay + jitter).max(0.0)
        } else {
            capped_delay
        };

        Duration::from_millis(final_delay as u64)
    }
}

/// Errors that can be checked for retryability
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for application::ApplicationError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientRemote(_) | Self::Timeout(_))
    }
}

/// Final result plus how many attempts it took
#[derive(Debug)]
pub struct RetryResult<T, E> {
    pub result: Result<T, E>,
    /// Number of attempts made (1 = no retries)
    pub attempts: u32,
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// runs out of retries
#[allow(clippy::cast_possible_truncation)]
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Operation succeeded after retries"
                    );
                }
                return RetryResult {
                    result: Ok(value),
                    attempts,
                    total_duration: start.elapsed(),
                };
            },
            Err(err) => {
                let retry_attempt = attempts - 1;

                if !err.is_retryable() || retry_attempt >= config.max_retries {
                    if err.is_retryable() {
                        warn!(
                            operation = operation_name,
                            attempts,
                            error = %err,
                            "Operation failed after max retries"
                        );
                    }
                    return RetryResult {
                        result: Err(err),
                        attempts,
                        total_duration: start.elapsed(),
                    };
                }

                let delay = config.delay_for_attempt(retry_attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
            },
        }
    }
}

/// [`with_retry`] without the metadata
pub async fn retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    with_retry(config, operation_name, operation)
        .await
        .into_result()
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    use application::ApplicationError;

    use super::*;

    #[test]
    fn config_default_values() {
        let config = RetryConfig::default();
        assert_eq!(config.initial_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 2_000);
        assert_eq!(config.max_retries, 2);
        assert!(config.jitter_factor > 0.0);
    }

    #[test]
    fn delay_calculation_without_jitter() {
        let config = RetryConfig::new(100, 10_000, 3).without_jitter();

        assert_eq!(config.delay_for_attempt(0).as_millis(), 100);
        assert_eq!(config.delay_for_attempt(1).as_millis(), 200);
        assert_eq!(config.delay_for_attempt(2).as_millis(), 400);
    }

    #[test]
    fn delay_capped_at_max() {
        let config = RetryConfig::new(1000, 2000, 5).without_jitter();

        assert_eq!(config.delay_for_attempt(1).as_millis(), 2000);
        assert_eq!(config.delay_for_attempt(10).as_millis(), 2000);
    }

    #[test]
    fn delay_with_jitter_stays_in_range() {
        let config = RetryConfig::new(1000, 10_000, 3);
        for _ in 0..50 {
            let ms = config.delay_for_attempt(0).as_millis();
            assert!((900..=1100).contains(&ms), "delay {ms} out of range");
        }
    }

    #[test]
    fn only_transient_errors_are_retried() {
        assert!(Retryable::is_retryable(&ApplicationError::TransientRemote("502".into())));
        assert!(Retryable::is_retryable(&ApplicationError::Timeout("read".into())));
        assert!(!Retryable::is_retryable(&ApplicationError::not_found("Contact", 1)));
        assert!(!Retryable::is_retryable(&ApplicationError::DuplicateIdentity("x".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = with_retry(&RetryConfig::default(), "search", || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ApplicationError::TransientRemote("503".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.attempts, 3);
        assert_eq!(result.into_result().unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result: Result<(), _> = retry(&RetryConfig::new(10, 100, 1), "get", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(ApplicationError::Timeout("get".into())) }
        })
        .await;

        assert!(matches!(result, Err(ApplicationError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);

        let result = with_retry(&RetryConfig::default(), "get", || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(ApplicationError::not_found("Conversation", 5)) }
        })
        .await;

        assert_eq!(result.attempts, 1);
        assert!(result.into_result().unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn disabled_makes_one_attempt() {
        let result = with_retry(&RetryConfig::disabled(), "get", || async {
            Err::<(), _>(ApplicationError::TransientRemote("down".into()))
        })
        .await;

        assert_eq!(result.attempts, 1);
    }

    proptest::proptest! {
        #[test]
        fn jittered_delay_never_exceeds_cap_plus_jitter(
            initial in 1u64..5_000,
            max in 1u64..60_000,
            attempt in 0u32..20,
        ) {
            let config = RetryConfig::new(initial, max, 3);
            let cap = initial.min(max) as f64 * 2f64.powi(attempt as i32);
            let ceiling = cap.min(max as f64) * 1.1;
            let delay = config.delay_for_attempt(attempt).as_millis() as f64;
            proptest::prop_assert!(delay <= ceiling + 1.0, "{delay} > {ceiling}");
        }
    }
}
