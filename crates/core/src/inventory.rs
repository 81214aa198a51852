//! Inventory snapshots, usage statistics and LRU candidate ordering

use crate::entry::CacheEntry;
use serde::{Deserialize, Serialize};

/// Where an inventory snapshot came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum Availability {
    /// Fetched from the remote store
    Live,
    /// The store could not be listed; the snapshot is empty
    Unavailable {
        /// Why the listing failed
        reason: String,
    },
}

/// One observation of the remote entry set.
///
/// Inventories are never reused across attempts: other pipeline runs add and
/// remove entries between observations, so each decision starts from a fresh
/// fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inventory {
    entries: Vec<CacheEntry>,
    availability: Availability,
}

impl Inventory {
    /// Snapshot from a successful listing
    #[must_use]
    pub const fn live(entries: Vec<CacheEntry>) -> Self {
        Self {
            entries,
            availability: Availability::Live,
        }
    }

    /// Empty snapshot standing in for a failed listing
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            availability: Availability::Unavailable {
                reason: reason.into(),
            },
        }
    }

    /// Listed entries in store order
    #[must_use]
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Consume the snapshot and return its entries
    #[must_use]
    pub fn into_entries(self) -> Vec<CacheEntry> {
        self.entries
    }

    /// Where this snapshot came from
    #[must_use]
    pub const fn availability(&self) -> &Availability {
        &self.availability
    }

    /// Whether the listing succeeded
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Live)
    }

    /// Size and count of the listed entries
    #[must_use]
    pub fn stats(&self) -> InventoryStats {
        aggregate(&self.entries)
    }

    /// Eviction candidates: everything except `exclude_key`, oldest first
    #[must_use]
    pub fn candidates(&self, exclude_key: Option<&str>) -> Vec<CacheEntry> {
        sort_by_lru(filter(self.entries.clone(), exclude_key))
    }
}

/// Aggregate usage of an entry set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryStats {
    /// Sum of entry sizes
    pub total_bytes: u64,
    /// Number of entries
    pub count: usize,
}

/// Sum sizes and count entries
#[must_use]
pub fn aggregate(entries: &[CacheEntry]) -> InventoryStats {
    InventoryStats {
        total_bytes: entries.iter().map(|e| e.size_bytes).sum(),
        count: entries.len(),
    }
}

/// Drop every entry keyed `exclude_key` so the in-flight cache is never evicted
#[must_use]
pub fn filter(entries: Vec<CacheEntry>, exclude_key: Option<&str>) -> Vec<CacheEntry> {
    match exclude_key.filter(|key| !key.is_empty()) {
        Some(key) => entries.into_iter().filter(|e| e.key != key).collect(),
        None => entries,
    }
}

/// Order candidates least recently used first.
///
/// Uses `last_accessed_at`, falling back to `created_at`. The sort is stable,
/// so ties keep listing order.
#[must_use]
pub fn sort_by_lru(mut candidates: Vec<CacheEntry>) -> Vec<CacheEntry> {
    candidates.sort_by_key(CacheEntry::recency);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn entry(id: u64, key: &str, size: u64, days_ago: i64) -> CacheEntry {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        CacheEntry::new(id, key, size, now - Duration::days(days_ago + 1))
            .last_accessed(now - Duration::days(days_ago))
    }

    #[test]
    fn test_aggregate_empty() {
        assert_eq!(aggregate(&[]), InventoryStats::default());
    }

    #[test]
    fn test_aggregate_sums_sizes() {
        let entries = vec![entry(1, "a", 100, 1), entry(2, "b", 250, 2)];
        let stats = aggregate(&entries);
        assert_eq!(stats.total_bytes, 350);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn test_filter_removes_every_matching_key() {
        let entries = vec![
            entry(1, "build-main", 10, 1),
            entry(2, "deps", 10, 2),
            entry(3, "build-main", 10, 3),
        ];

        let kept = filter(entries, Some("build-main"));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
    }

    #[test]
    fn test_filter_without_key_keeps_everything() {
        let entries = vec![entry(1, "a", 1, 1), entry(2, "b", 1, 1)];
        assert_eq!(filter(entries.clone(), None).len(), 2);
        assert_eq!(filter(entries, Some("")).len(), 2);
    }

    #[test]
    fn test_sort_oldest_first() {
        let entries = vec![
            entry(1, "recent", 1, 2),
            entry(2, "oldest", 1, 30),
            entry(3, "middle", 1, 10),
        ];

        let ids: Vec<u64> = sort_by_lru(entries).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_sort_falls_back_to_created_at() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let never_used = CacheEntry::new(1, "never-used", 1, base - Duration::days(5));
        let used = CacheEntry::new(2, "used", 1, base - Duration::days(40))
            .last_accessed(base - Duration::days(1));

        let ids: Vec<u64> = sort_by_lru(vec![used, never_used])
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let entries = vec![entry(7, "x", 1, 3), entry(3, "y", 1, 3), entry(5, "z", 1, 3)];
        let ids: Vec<u64> = sort_by_lru(entries).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }

    #[test]
    fn test_unavailable_inventory_is_empty() {
        let inventory = Inventory::unavailable("GITHUB_TOKEN is not set");
        assert!(!inventory.is_available());
        assert_eq!(inventory.stats().count, 0);
        assert!(inventory.candidates(None).is_empty());
    }

    #[test]
    fn test_candidates_filter_then_sort() {
        let inventory = Inventory::live(vec![
            entry(1, "current", 500, 40),
            entry(2, "old", 100, 20),
            entry(3, "new", 100, 1),
        ]);

        let ids: Vec<u64> = inventory
            .candidates(Some("current"))
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
        // The snapshot itself still reports the excluded entry
        assert_eq!(inventory.stats().total_bytes, 700);
    }
}
