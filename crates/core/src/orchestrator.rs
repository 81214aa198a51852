//! Cleanup orchestration: the pre-save pass and the repository-wide loop
//!
//! There is no lock shared between pipeline runs. Several jobs may clean the
//! same repository at once, so both paths plan only from an inventory fetched
//! immediately before, tolerate entries vanishing underneath them, and treat
//! the outcome as best-effort: anything left over is picked up by the next
//! invocation's fresh fetch.

use crate::config::{BYTES_PER_MB, EvictionConfig};
use crate::error::Result;
use crate::executor::{CleanupResult, EvictionExecutor, ExecutorOptions};
use crate::inventory::InventoryStats;
use crate::planner::{EvictionPlan, NeedsCleanup};
use crate::store::RemoteCacheClient;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// How a cleanup run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupStatus {
    /// The store could not be listed; nothing was evaluated
    Unavailable,
    /// Usage is within the threshold
    Healthy,
    /// Cleanup was needed but every entry is protected
    NoCandidates,
    /// An attempt deleted nothing; other processes won the race or the
    /// candidates are exhausted
    NoProgress,
    /// A single planned pass ran to completion
    Completed,
    /// The attempt cap was reached while still making progress
    AttemptsExhausted,
}

impl CleanupStatus {
    /// Stable label used in outputs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Healthy => "healthy",
            Self::NoCandidates => "no-candidates",
            Self::NoProgress => "no-progress",
            Self::Completed => "completed",
            Self::AttemptsExhausted => "attempts-exhausted",
        }
    }
}

impl fmt::Display for CleanupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a cleanup run, reported back to the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// How the run ended
    pub status: CleanupStatus,
    /// Decision of the last evaluated attempt
    pub reason: NeedsCleanup,
    /// Attempts started
    pub attempts: u32,
    /// Whether deletions were simulated
    pub dry_run: bool,
    /// Usage observed by the last fetch
    pub inventory: InventoryStats,
    /// Accumulated result of every attempt
    pub result: CleanupResult,
}

impl CleanupReport {
    fn new(dry_run: bool) -> Self {
        Self {
            status: CleanupStatus::Healthy,
            reason: NeedsCleanup::None,
            attempts: 0,
            dry_run,
            inventory: InventoryStats::default(),
            result: CleanupResult::default(),
        }
    }

    /// Whether this run actually removed entries
    #[must_use]
    pub const fn cleanup_performed(&self) -> bool {
        !self.dry_run && self.result.entries_deleted > 0
    }

    /// Space freed (or, in a dry run, that would be freed) in megabytes
    #[must_use]
    pub const fn space_freed_mb(&self) -> u64 {
        self.result.space_freed_mb()
    }
}

/// Result of one fetch-evaluate-evict cycle
enum Attempt {
    /// The run is over with this status
    Converged(CleanupStatus),
    /// Deletions happened; another attempt may help
    Progressed,
}

/// Runs the planner and executor against a remote cache
#[derive(Debug)]
pub struct CleanupOrchestrator {
    client: RemoteCacheClient,
    config: EvictionConfig,
}

impl CleanupOrchestrator {
    /// Create an orchestrator.
    ///
    /// The client's retry policy is replaced by the one in `config`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `config` fails validation.
    pub fn new(client: RemoteCacheClient, config: EvictionConfig) -> Result<Self> {
        config.validate()?;
        let client = client.with_retry(config.retry.clone());
        Ok(Self { client, config })
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &EvictionConfig {
        &self.config
    }

    /// Single cleanup pass before saving a new entry of `projected_bytes`.
    ///
    /// Makes room so that current usage plus the new entry ends under the
    /// threshold. A no-op when it already fits.
    pub async fn pre_save(&self, key: Option<&str>, projected_bytes: u64) -> CleanupReport {
        let mut report = CleanupReport::new(self.config.dry_run);
        info!(
            scope = %self.client.scope(),
            projected_mb = projected_bytes / BYTES_PER_MB,
            dry_run = self.config.dry_run,
            "Running pre-save cache cleanup"
        );

        report.status = match self.attempt(key, Some(projected_bytes), &mut report).await {
            Attempt::Converged(status) => status,
            Attempt::Progressed => CleanupStatus::Completed,
        };

        log_summary("pre-save", &report);
        report
    }

    /// Repository-wide cleanup, repeated until usage converges.
    ///
    /// Each attempt re-fetches the inventory and plans from scratch. The loop
    /// ends early when the repository is healthy, nothing is evictable, an
    /// attempt deletes nothing, or the store is unavailable. A dry run stops
    /// after its first attempt because a re-fetch would observe the same
    /// state.
    pub async fn repository_wide(&self, key: Option<&str>) -> CleanupReport {
        let mut report = CleanupReport::new(self.config.dry_run);
        info!(
            scope = %self.client.scope(),
            max_attempts = self.config.max_attempts,
            dry_run = self.config.dry_run,
            "Running repository-wide cache cleanup"
        );

        report.status = CleanupStatus::AttemptsExhausted;
        while report.attempts < self.config.max_attempts {
            match self.attempt(key, None, &mut report).await {
                Attempt::Converged(status) => {
                    report.status = status;
                    break;
                }
                Attempt::Progressed if self.config.dry_run => {
                    report.status = CleanupStatus::Completed;
                    break;
                }
                Attempt::Progressed => {
                    if report.attempts < self.config.max_attempts {
                        let settle = self.config.settle_delay();
                        debug!(
                            settle_ms = self.config.settle_delay_ms,
                            "Waiting for the cache listing to settle"
                        );
                        tokio::time::sleep(settle).await;
                    }
                }
            }
        }

        if report.status == CleanupStatus::AttemptsExhausted {
            warn!(
                attempts = report.attempts,
                "Attempt limit reached before cache usage converged"
            );
        }

        log_summary("repository-wide", &report);
        report
    }

    async fn attempt(
        &self,
        key: Option<&str>,
        projected_bytes: Option<u64>,
        report: &mut CleanupReport,
    ) -> Attempt {
        report.attempts += 1;
        let attempt = report.attempts;

        // Fetching
        let inventory = self.client.list_entries().await;
        if !inventory.is_available() {
            info!(attempt, "Cache inventory unavailable, skipping cleanup");
            return Attempt::Converged(CleanupStatus::Unavailable);
        }

        // Evaluating
        let stats = inventory.stats();
        report.inventory = stats;
        info!(
            attempt,
            entries = stats.count,
            total_mb = stats.total_bytes / BYTES_PER_MB,
            max_mb = self.config.max_bytes() / BYTES_PER_MB,
            threshold_mb = self.config.threshold_bytes() / BYTES_PER_MB,
            "Evaluated cache usage"
        );

        let Some(plan) = EvictionPlan::build(stats, &self.config, key, projected_bytes) else {
            report.reason = NeedsCleanup::None;
            info!(attempt, "Cache usage within threshold, no cleanup needed");
            return Attempt::Converged(CleanupStatus::Healthy);
        };
        report.reason = plan.reason;

        let candidates = inventory.candidates(plan.exclude_key.as_deref());
        if candidates.is_empty() {
            info!(
                attempt,
                reason = %plan.reason,
                "Cleanup needed but no entries are eligible for eviction"
            );
            return Attempt::Converged(CleanupStatus::NoCandidates);
        }

        // Evicting
        info!(
            attempt,
            reason = %plan.reason,
            target_mb = plan.target_bytes / BYTES_PER_MB,
            candidates = candidates.len(),
            "Evicting least recently used cache entries"
        );
        let executor = EvictionExecutor::new(
            &self.client,
            ExecutorOptions {
                dry_run: self.config.dry_run,
                max_deletions: self.config.max_deletions_per_attempt,
                pacing_delay: self.config.pacing_delay(),
            },
        );
        let result = executor.execute(&candidates, plan.target_bytes).await;
        let deleted = result.entries_deleted;
        report.result.absorb(result);

        if deleted == 0 {
            info!(
                attempt,
                "No entries deleted in this attempt, other processes may have cleaned up already"
            );
            return Attempt::Converged(CleanupStatus::NoProgress);
        }
        Attempt::Progressed
    }
}

fn log_summary(path: &str, report: &CleanupReport) {
    info!(
        path,
        status = %report.status,
        attempts = report.attempts,
        deleted = report.result.entries_deleted,
        already_gone = report.result.already_gone,
        failed = report.result.failed,
        freed_mb = report.space_freed_mb(),
        dry_run = report.dry_run,
        "Cache cleanup finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(CleanupStatus::Unavailable.to_string(), "unavailable");
        assert_eq!(CleanupStatus::AttemptsExhausted.as_str(), "attempts-exhausted");
    }

    #[test]
    fn test_dry_run_never_reports_performed() {
        let mut report = CleanupReport::new(true);
        report.result.entries_deleted = 3;
        report.result.bytes_freed = 300 * BYTES_PER_MB;
        assert!(!report.cleanup_performed());
        assert_eq!(report.space_freed_mb(), 300);

        report.dry_run = false;
        assert!(report.cleanup_performed());
    }

    #[test]
    fn test_report_serializes_status_kebab_case() {
        let mut report = CleanupReport::new(false);
        report.status = CleanupStatus::NoProgress;
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "no-progress");
        assert_eq!(json["reason"], "none");
    }
}
