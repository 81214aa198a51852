//! GitHub Actions cache store for cachequota.
//!
//! This crate provides:
//! - [`GitHubContext`] for resolving the repository and token of a workflow run
//! - [`GitHubCacheStore`], a [`cachequota_core::CacheStore`] over the Actions
//!   cache REST API

#![warn(missing_docs)]

pub mod context;
pub mod store;

pub use context::{DEFAULT_API_URL, GitHubContext, parse_repo};
pub use store::{CacheListPage, GitHubCacheStore, check_status, parse_page, store_from_context};
