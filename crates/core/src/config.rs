//! Eviction configuration

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bytes in one megabyte (binary)
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Bytes in one gigabyte (binary)
pub const BYTES_PER_GB: u64 = 1024 * BYTES_PER_MB;

/// Default quota for a repository cache (8 GB)
pub const DEFAULT_MAX_SIZE_GB: u64 = 8;

/// Fraction of the quota that triggers cleanup
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.8;

/// Configuration shared by both cleanup paths
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvictionConfig {
    /// Hard quota in gigabytes
    #[serde(default = "default_max_size_gb")]
    pub max_size_gb: u64,

    /// Fraction of the quota cleanup frees down to
    #[serde(default = "default_threshold_ratio")]
    pub threshold_ratio: f64,

    /// Deletions allowed per attempt
    #[serde(default = "default_max_deletions_per_attempt")]
    pub max_deletions_per_attempt: usize,

    /// Attempts for repository-wide cleanup
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Report planned deletions without issuing them
    #[serde(default)]
    pub dry_run: bool,

    /// Pause between consecutive deletions in milliseconds
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    /// Pause after an attempt with deletions, before re-listing, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Retry policy for list and delete calls
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            max_size_gb: default_max_size_gb(),
            threshold_ratio: default_threshold_ratio(),
            max_deletions_per_attempt: default_max_deletions_per_attempt(),
            max_attempts: default_max_attempts(),
            dry_run: false,
            pacing_delay_ms: default_pacing_delay_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EvictionConfig {
    /// Set the quota in gigabytes
    #[must_use]
    pub const fn max_size_gb(mut self, gb: u64) -> Self {
        self.max_size_gb = gb;
        self
    }

    /// Enable or disable dry-run mode
    #[must_use]
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the pacing and settle delays
    #[must_use]
    pub const fn delays(mut self, pacing: Duration, settle: Duration) -> Self {
        self.pacing_delay_ms = duration_ms(pacing);
        self.settle_delay_ms = duration_ms(settle);
        self
    }

    /// Replace the retry policy
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Quota in bytes
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_size_gb.saturating_mul(BYTES_PER_GB)
    }

    /// Cleanup threshold in bytes
    #[must_use]
    pub fn threshold_bytes(&self) -> u64 {
        crate::planner::threshold_bytes(self.max_bytes(), self.threshold_ratio)
    }

    /// Pause between consecutive deletions
    #[must_use]
    pub const fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    /// Pause before re-listing after deletions
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Check the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a zero quota, a threshold ratio
    /// outside `(0, 1]`, or zero deletion/attempt caps.
    pub fn validate(&self) -> Result<()> {
        if self.max_size_gb == 0 {
            return Err(Error::configuration("max_size_gb must be greater than 0"));
        }
        if !(self.threshold_ratio > 0.0 && self.threshold_ratio <= 1.0) {
            return Err(Error::configuration(format!(
                "threshold_ratio must be in (0, 1], got {}",
                self.threshold_ratio
            )));
        }
        if self.max_deletions_per_attempt == 0 {
            return Err(Error::configuration(
                "max_deletions_per_attempt must be greater than 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::configuration("max_attempts must be greater than 0"));
        }
        Ok(())
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

// Default value functions
const fn default_max_size_gb() -> u64 {
    DEFAULT_MAX_SIZE_GB
}

const fn default_threshold_ratio() -> f64 {
    DEFAULT_THRESHOLD_RATIO
}

const fn default_max_deletions_per_attempt() -> usize {
    5
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_pacing_delay_ms() -> u64 {
    1_000
}

const fn default_settle_delay_ms() -> u64 {
    5_000
}
