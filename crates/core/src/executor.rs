//! Eviction executor: deletes LRU candidates until a byte target is met

use crate::config::BYTES_PER_MB;
use crate::entry::{CacheEntry, DeleteOutcome};
use crate::store::RemoteCacheClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// An entry removed (or, in dry-run mode, selected for removal)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictedEntry {
    /// Store identifier
    pub id: u64,
    /// Cache key
    pub key: String,
    /// Size freed
    pub size_bytes: u64,
}

/// Accounting for one execution.
///
/// Only deletions confirmed by this process count towards `bytes_freed` and
/// `entries_deleted`. Entries that were already gone, or whose deletion kept
/// failing, are tallied separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    /// Bytes freed by this process
    pub bytes_freed: u64,
    /// Entries deleted by this process
    pub entries_deleted: usize,
    /// Candidates another process deleted first
    pub already_gone: usize,
    /// Candidates whose deletion failed after retries
    pub failed: usize,
    /// Deleted entries in deletion order
    pub evicted: Vec<EvictedEntry>,
}

impl CleanupResult {
    /// Space freed in whole megabytes
    #[must_use]
    pub const fn space_freed_mb(&self) -> u64 {
        self.bytes_freed / BYTES_PER_MB
    }

    /// Fold another execution's result into this one
    pub fn absorb(&mut self, other: Self) {
        self.bytes_freed += other.bytes_freed;
        self.entries_deleted += other.entries_deleted;
        self.already_gone += other.already_gone;
        self.failed += other.failed;
        self.evicted.extend(other.evicted);
    }

    fn record(&mut self, entry: &CacheEntry) {
        self.bytes_freed += entry.size_bytes;
        self.entries_deleted += 1;
        self.evicted.push(EvictedEntry {
            id: entry.id,
            key: entry.key.clone(),
            size_bytes: entry.size_bytes,
        });
    }
}

/// Options for one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Simulate deletions without calling the store
    pub dry_run: bool,
    /// Stop after this many confirmed deletions
    pub max_deletions: usize,
    /// Pause between consecutive real deletions
    pub pacing_delay: Duration,
}

/// Walks ordered candidates and deletes until the target is met
#[derive(Debug)]
pub struct EvictionExecutor<'a> {
    client: &'a RemoteCacheClient,
    options: ExecutorOptions,
}

impl<'a> EvictionExecutor<'a> {
    /// Create an executor over `client`
    #[must_use]
    pub const fn new(client: &'a RemoteCacheClient, options: ExecutorOptions) -> Self {
        Self { client, options }
    }

    /// Delete candidates in order until `target_bytes` are freed.
    ///
    /// Stops when the target is met or `max_deletions` deletions were
    /// deleted or failed, whichever comes first. Running out of candidates is not an error; the
    /// partial result is returned. A dry run applies the same stop conditions
    /// to simulated deletions, so it predicts the real run.
    pub async fn execute(&self, candidates: &[CacheEntry], target_bytes: u64) -> CleanupResult {
        let ExecutorOptions {
            dry_run,
            max_deletions,
            pacing_delay,
        } = self.options;
        let mut result = CleanupResult::default();
        let mut issued_delete = false;

        for entry in candidates {
            if result.bytes_freed >= target_bytes {
                debug!(
                    freed = result.bytes_freed,
                    target = target_bytes,
                    "Cleanup target reached"
                );
                break;
            }
            // Failed deletes spend the same API budget as confirmed ones
            if result.entries_deleted + result.failed >= max_deletions {
                info!(
                    deleted = result.entries_deleted,
                    failed = result.failed,
                    max_deletions, "Deletion cap reached for this attempt"
                );
                break;
            }

            if dry_run {
                info!(
                    id = entry.id,
                    key = %entry.key,
                    size_mb = entry.size_bytes / BYTES_PER_MB,
                    last_used = %entry.recency(),
                    "[dry-run] Would delete cache entry"
                );
                result.record(entry);
                continue;
            }

            if issued_delete && !pacing_delay.is_zero() {
                tokio::time::sleep(pacing_delay).await;
            }
            issued_delete = true;

            match self.client.delete_entry(entry).await {
                Ok(DeleteOutcome::Deleted) => {
                    info!(
                        id = entry.id,
                        key = %entry.key,
                        size_mb = entry.size_bytes / BYTES_PER_MB,
                        last_used = %entry.recency(),
                        "Deleted cache entry"
                    );
                    result.record(entry);
                }
                Ok(DeleteOutcome::AlreadyGone) => {
                    result.already_gone += 1;
                }
                Err(e) => {
                    warn!(
                        id = entry.id,
                        key = %entry.key,
                        error = %e,
                        "Failed to delete cache entry"
                    );
                    result.failed += 1;
                }
            }
        }

        if result.bytes_freed < target_bytes {
            info!(
                freed_mb = result.space_freed_mb(),
                target_mb = target_bytes / BYTES_PER_MB,
                "Cleanup target not fully met"
            );
        }

        result
    }
}
