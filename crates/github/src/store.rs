//! GitHub Actions cache store.
//!
//! Talks to the repository-scoped cache endpoints of the REST API:
//! - `GET /repos/{owner}/{repo}/actions/caches` (paginated listing)
//! - `DELETE /repos/{owner}/{repo}/actions/caches/{cache_id}`
//!
//! Each method performs plain HTTP calls and classifies failures;
//! retrying and not-found tolerance live in
//! [`cachequota_core::RemoteCacheClient`].

use async_trait::async_trait;
use cachequota_core::{CacheEntry, CacheStore, StoreError, UnavailableStore};
use octocrab::Octocrab;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::GitHubContext;

/// Entries requested per listing page (the API maximum)
pub const PER_PAGE: usize = 100;

/// Upper bound on listing pages, guarding against a listing that never ends
const MAX_PAGES: usize = 100;

/// One page of the cache listing
#[derive(Debug, Clone, Deserialize)]
pub struct CacheListPage {
    /// Entries in the repository across all pages
    pub total_count: usize,
    /// Entries on this page
    #[serde(default)]
    pub actions_caches: Vec<CacheEntry>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// [`CacheStore`] backed by the GitHub Actions cache API
pub struct GitHubCacheStore {
    client: Octocrab,
    context: GitHubContext,
}

impl GitHubCacheStore {
    /// Create a store for `context`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] when the HTTP client cannot be
    /// constructed.
    pub fn new(context: GitHubContext) -> Result<Self, StoreError> {
        let client = Octocrab::builder()
            .personal_token(context.token.clone())
            .build()
            .map_err(|e| StoreError::unavailable(format!("Failed to create GitHub client: {e}")))?;

        Ok(Self { client, context })
    }

    fn caches_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/actions/caches",
            self.context.api_url.trim_end_matches('/'),
            self.context.owner,
            self.context.repo
        )
    }

    async fn get_page(&self, page: usize) -> Result<CacheListPage, StoreError> {
        let url = format!("{}?per_page={PER_PAGE}&page={page}", self.caches_url());
        let response = self
            .client
            ._get(url.as_str())
            .await
            .map_err(map_client_error)?;

        let status = response.status().as_u16();
        let body = self
            .client
            .body_to_string(response)
            .await
            .map_err(map_client_error)?;
        check_status(status, &body, "actions/caches")?;

        parse_page(&body)
    }
}

#[async_trait]
impl CacheStore for GitHubCacheStore {
    fn scope(&self) -> String {
        format!("github:{}", self.context.slug())
    }

    async fn list_entries(&self) -> Result<Vec<CacheEntry>, StoreError> {
        let mut entries = Vec::new();

        for page in 1..=MAX_PAGES {
            let listing = self.get_page(page).await?;
            let received = listing.actions_caches.len();
            entries.extend(listing.actions_caches);
            debug!(page, received, total = listing.total_count, "Fetched cache listing page");

            if received < PER_PAGE || entries.len() >= listing.total_count {
                return Ok(entries);
            }
        }

        warn!(
            pages = MAX_PAGES,
            entries = entries.len(),
            "Cache listing truncated at page limit"
        );
        Ok(entries)
    }

    async fn delete_entry(&self, id: u64) -> Result<(), StoreError> {
        let url = format!("{}/{id}", self.caches_url());
        let response = self
            .client
            ._delete(url.as_str(), None::<&()>)
            .await
            .map_err(map_client_error)?;

        let status = response.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }

        let body = self
            .client
            .body_to_string(response)
            .await
            .unwrap_or_default();
        check_status(status, &body, &format!("actions/caches/{id}"))
    }
}

impl std::fmt::Debug for GitHubCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubCacheStore")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Build the store for the current environment.
///
/// Missing credentials or a client that cannot be built yield an
/// [`UnavailableStore`], so cleanup is skipped instead of failing the job.
#[must_use]
pub fn store_from_context(context: Result<GitHubContext, String>) -> Arc<dyn CacheStore> {
    let context = match context {
        Ok(context) => context,
        Err(reason) => {
            warn!(%reason, "GitHub cache API not configured, cleanup will be skipped");
            return Arc::new(UnavailableStore::new(reason));
        }
    };

    match GitHubCacheStore::new(context) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "GitHub client unavailable, cleanup will be skipped");
            Arc::new(UnavailableStore::new(e.to_string()))
        }
    }
}

/// Parse one listing page.
///
/// # Errors
///
/// Returns [`StoreError::Malformed`] when the body is not a listing.
pub fn parse_page(body: &str) -> Result<CacheListPage, StoreError> {
    serde_json::from_str(body)
        .map_err(|e| StoreError::malformed(format!("Invalid cache listing: {e}")))
}

/// Classify an HTTP status.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] for 404 and [`StoreError::Status`] for any
/// other non-success status. Secondary rate limits arrive as 403 and are
/// reported as 429 so they are retried.
pub fn check_status(status: u16, body: &str, resource: &str) -> Result<(), StoreError> {
    if (200..300).contains(&status) {
        return Ok(());
    }
    if status == 404 {
        return Err(StoreError::not_found(resource));
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.chars().take(200).collect());

    if status == 403 && message.to_lowercase().contains("rate limit") {
        return Err(StoreError::status(429, message));
    }
    Err(StoreError::status(status, message))
}

fn map_client_error(err: octocrab::Error) -> StoreError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            if status == 404 {
                StoreError::not_found(source.message)
            } else {
                StoreError::status(status, source.message)
            }
        }
        other => StoreError::transport(other.to_string()),
    }
}
