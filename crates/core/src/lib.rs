//! Eviction engine that keeps a remote CI cache under its size quota
//!
//! This crate decides whether a repository's remote build cache needs
//! cleanup, which entries to remove and how much to remove, and performs the
//! deletions safely while other pipeline runs race against the same entries:
//! - [`store`]: the [`CacheStore`] seam and the retrying [`RemoteCacheClient`]
//! - [`inventory`]: usage statistics, in-flight key filtering, LRU ordering
//! - [`planner`]: cleanup decisions and byte targets
//! - [`executor`]: capped, paced deletion of LRU candidates
//! - [`orchestrator`]: the pre-save pass and the repository-wide loop
//! - [`mod@estimate`]: projected size of an entry that is about to be saved
//!
//! # Concurrency contract
//!
//! No lock is shared between processes. Eviction is best-effort, idempotent
//! and eventually consistent: deletes tolerate entries that are already gone,
//! and every plan starts from a freshly fetched inventory.

pub mod config;
pub mod entry;
mod error;
pub mod estimate;
pub mod executor;
pub mod inventory;
pub mod orchestrator;
pub mod planner;
pub mod retry;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result, StoreError};

// Re-export main types
pub use config::{BYTES_PER_GB, BYTES_PER_MB, EvictionConfig};
pub use entry::{CacheEntry, DeleteOutcome};
pub use estimate::{SizeEstimate, estimate, estimate_patterns};
pub use executor::{CleanupResult, EvictedEntry, EvictionExecutor, ExecutorOptions};
pub use inventory::{Availability, Inventory, InventoryStats, aggregate, filter, sort_by_lru};
pub use orchestrator::{CleanupOrchestrator, CleanupReport, CleanupStatus};
pub use planner::{EvictionPlan, NeedsCleanup, compute_target, decide};
pub use retry::RetryPolicy;
pub use store::{CacheStore, RemoteCacheClient, UnavailableStore};
