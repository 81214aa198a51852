//! Retry logic with exponential backoff and jitter for remote cache calls
//!
//! Many pipeline jobs hit the same API at once after a shared trigger, so every
//! wait is randomised around its exponential step. Not-found responses are
//! returned immediately: under concurrent eviction they are an answer, not a
//! transient failure.

use crate::error::StoreError;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder, backoff::Backoff};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Reusable retry policy shared by the list and delete operations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Upper bound for a single wait in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor between consecutive waits
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Randomisation factor applied to each wait (0.5 means ±50%)
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl RetryPolicy {
    /// Policy that retries without waiting, for tests and local stores
    #[must_use]
    pub const fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Run `f` until it succeeds, fails permanently, or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns the original error when it is not retryable (including
    /// [`StoreError::NotFound`]), or [`StoreError::RetryExhausted`] once
    /// `max_attempts` calls have failed.
    pub async fn run<F, Fut, T>(&self, operation: &str, mut f: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut backoff = self.backoff();
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;

            let err = match f().await {
                Ok(value) => {
                    if attempts > 1 {
                        debug!(operation, attempts, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                debug!(operation, error = %err, "Error is not retryable, failing immediately");
                return Err(err);
            }

            if attempts >= max_attempts {
                warn!(
                    operation,
                    attempts,
                    error = %err,
                    "Operation failed after maximum retries"
                );
                return Err(StoreError::retry_exhausted(
                    operation,
                    attempts,
                    err.to_string(),
                ));
            }

            let Some(wait) = backoff.next_backoff() else {
                return Err(StoreError::retry_exhausted(
                    operation,
                    attempts,
                    err.to_string(),
                ));
            };

            warn!(
                operation,
                attempts,
                error = %err,
                retry_in_ms = wait.as_millis(),
                "Operation failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.base_delay_ms))
            .with_max_interval(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(self.multiplier)
            .with_randomization_factor(self.jitter)
            .with_max_elapsed_time(None) // bounded by max_attempts instead
            .build()
    }
}

const fn default_max_attempts() -> usize {
    5
}

const fn default_base_delay_ms() -> u64 {
    1_000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_multiplier() -> f64 {
    2.0
}

const fn default_jitter() -> f64 {
    0.5
}
