//! Remote cache entry metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of one entry in the remote cache store.
///
/// Entries are owned by the store. The engine only observes and deletes
/// them; size and timestamps are never modified locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    /// Store-assigned identifier used for deletion
    pub id: u64,

    /// Cache key the entry was saved under
    pub key: String,

    /// Archive size as reported by the store
    #[serde(rename = "size_in_bytes")]
    pub size_bytes: u64,

    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// Last restore time, if the store tracks it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,

    /// Git ref the entry is scoped to
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,

    /// Store-side version hash of the cached paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl CacheEntry {
    /// Create an entry with no recorded access
    #[must_use]
    pub fn new(id: u64, key: impl Into<String>, size_bytes: u64, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            key: key.into(),
            size_bytes,
            created_at,
            last_accessed_at: None,
            git_ref: None,
            version: None,
        }
    }

    /// Set the last access time
    #[must_use]
    pub fn last_accessed(mut self, at: DateTime<Utc>) -> Self {
        self.last_accessed_at = Some(at);
        self
    }

    /// Effective recency: last access, falling back to creation time
    #[must_use]
    pub fn recency(&self) -> DateTime<Utc> {
        self.last_accessed_at.unwrap_or(self.created_at)
    }
}

/// Outcome of a successful delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeleteOutcome {
    /// This process removed the entry
    Deleted,
    /// The entry no longer existed, typically removed by a concurrent cleanup
    AlreadyGone,
}
