//! Remote cache store abstraction and the retrying client built on it
//!
//! A [`CacheStore`] performs exactly one network call per method and reports
//! failures as classified [`StoreError`]s. [`RemoteCacheClient`] adds the
//! retry policy and turns failures into the engine's benign outcomes: a failed
//! listing becomes an unavailable (empty) inventory, and a not-found delete
//! becomes [`DeleteOutcome::AlreadyGone`].

use crate::entry::{CacheEntry, DeleteOutcome};
use crate::error::StoreError;
use crate::inventory::Inventory;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Raw access to a repository-scoped remote cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Human-readable scope for logs, e.g. `github:owner/repo`
    fn scope(&self) -> String;

    /// List every entry in the store.
    ///
    /// # Errors
    ///
    /// Returns a classified [`StoreError`] when the listing fails.
    async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError>;

    /// Delete one entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the entry does not exist, or
    /// another [`StoreError`] when the call fails.
    async fn delete_entry(&self, id: u64) -> Result<(), StoreError>;
}

/// Store used when the remote tooling is missing.
///
/// Every call fails with [`StoreError::Unavailable`], which the client maps
/// to an unavailable inventory so cleanup is skipped without failing the job.
#[derive(Debug, Clone)]
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    /// Create a store that always reports `reason`
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CacheStore for UnavailableStore {
    fn scope(&self) -> String {
        "unavailable".to_string()
    }

    async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
        Err(StoreError::unavailable(self.reason.clone()))
    }

    async fn delete_entry(&self, _id: u64) -> Result<(), StoreError> {
        Err(StoreError::unavailable(self.reason.clone()))
    }
}

/// Retrying, race-tolerant client over a [`CacheStore`]
pub struct RemoteCacheClient {
    store: Arc<dyn CacheStore>,
    retry: RetryPolicy,
}

impl RemoteCacheClient {
    /// Wrap `store` with the default retry policy
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scope of the underlying store
    #[must_use]
    pub fn scope(&self) -> String {
        self.store.scope()
    }

    /// Fetch a fresh inventory.
    ///
    /// Never fails: an unreachable, unprovisioned or malformed listing is
    /// reported as an unavailable inventory with no entries.
    pub async fn list_entries(&self) -> Inventory {
        let store = &self.store;
        match self
            .retry
            .run("list cache entries", move || store.list_entries())
            .await
        {
            Ok(entries) => {
                debug!(scope = %self.scope(), entries = entries.len(), "Fetched cache inventory");
                Inventory::live(entries)
            }
            Err(e) => {
                warn!(
                    scope = %self.scope(),
                    error = %e,
                    "Could not list cache entries, treating cache as empty"
                );
                Inventory::unavailable(e.to_string())
            }
        }
    }

    /// Delete one entry, treating not-found as [`DeleteOutcome::AlreadyGone`].
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] left after retries for any failure other
    /// than not-found.
    pub async fn delete_entry(&self, entry: &CacheEntry) -> Result<DeleteOutcome, StoreError> {
        let store = &self.store;
        let id = entry.id;
        match self
            .retry
            .run("delete cache entry", move || store.delete_entry(id))
            .await
        {
            Ok(()) => Ok(DeleteOutcome::Deleted),
            Err(e) if e.is_not_found() => {
                info!(
                    id,
                    key = %entry.key,
                    "Cache entry already gone, likely removed by a concurrent cleanup"
                );
                Ok(DeleteOutcome::AlreadyGone)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for RemoteCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCacheClient")
            .field("scope", &self.store.scope())
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Store that replays scripted results
    struct ScriptedStore {
        lists: Mutex<Vec<Result<Vec<CacheEntry>, StoreError>>>,
        deletes: Mutex<Vec<Result<(), StoreError>>>,
    }

    #[async_trait]
    impl CacheStore for ScriptedStore {
        fn scope(&self) -> String {
            "scripted".to_string()
        }

        async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
            self.lists.lock().unwrap().remove(0)
        }

        async fn delete_entry(&self, _id: u64) -> Result<(), StoreError> {
            self.deletes.lock().unwrap().remove(0)
        }
    }

    fn client(
        lists: Vec<Result<Vec<CacheEntry>, StoreError>>,
        deletes: Vec<Result<(), StoreError>>,
    ) -> RemoteCacheClient {
        RemoteCacheClient::new(Arc::new(ScriptedStore {
            lists: Mutex::new(lists),
            deletes: Mutex::new(deletes),
        }))
        .with_retry(RetryPolicy::immediate(5))
    }

    #[tokio::test]
    async fn test_list_retries_then_succeeds() {
        let entry = CacheEntry::new(1, "k", 10, Utc::now());
        let client = client(
            vec![Err(StoreError::status(502, "bad gateway")), Ok(vec![entry])],
            vec![],
        );

        let inventory = client.list_entries().await;
        assert!(inventory.is_available());
        assert_eq!(inventory.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_list_degrades_to_empty() {
        let failures = (0..5).map(|_| Err(StoreError::transport("timeout"))).collect();
        let client = client(failures, vec![]);

        let inventory = client.list_entries().await;
        assert!(!inventory.is_available());
        assert!(inventory.entries().is_empty());
    }

    #[tokio::test]
    async fn test_list_unprovisioned_endpoint_is_empty() {
        let client = client(vec![Err(StoreError::not_found("caches"))], vec![]);
        let inventory = client.list_entries().await;
        assert!(inventory.entries().is_empty());
    }

    #[tokio::test]
    async fn test_delete_not_found_is_already_gone() {
        let client = client(vec![], vec![Err(StoreError::not_found("7"))]);
        let entry = CacheEntry::new(7, "k", 10, Utc::now());

        let outcome = client.delete_entry(&entry).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn test_delete_retries_transient_failure() {
        let client = client(
            vec![],
            vec![Err(StoreError::status(500, "oops")), Ok(())],
        );
        let entry = CacheEntry::new(7, "k", 10, Utc::now());

        let outcome = client.delete_entry(&entry).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Deleted);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let client = RemoteCacheClient::new(Arc::new(UnavailableStore::new("no token")))
            .with_retry(RetryPolicy::immediate(5));

        let inventory = client.list_entries().await;
        assert!(matches!(
            inventory.availability(),
            crate::inventory::Availability::Unavailable { reason } if reason.contains("no token")
        ));
    }
}
