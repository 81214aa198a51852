//! GitHub repository context resolution.
//!
//! Cache entries are scoped by repository, so every store needs the
//! `owner/repo` slug and a token allowed to manage Actions caches.

use tracing::debug;

/// Default REST endpoint for github.com
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Repository and credentials for the Actions cache API
#[derive(Clone, PartialEq, Eq)]
pub struct GitHubContext {
    /// Repository owner (user or organization)
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Token with `actions: write` permission
    pub token: String,
    /// REST API base URL; differs from the default on GitHub Enterprise Server
    pub api_url: String,
}

impl GitHubContext {
    /// Build a context from an `owner/repo` slug.
    ///
    /// Returns `None` when the slug is malformed or the token is empty.
    #[must_use]
    pub fn new(repository: &str, token: impl Into<String>, api_url: Option<String>) -> Option<Self> {
        let (owner, repo) = parse_repo(repository)?;
        let token = token.into();
        if token.trim().is_empty() {
            return None;
        }

        Some(Self {
            owner,
            repo,
            token,
            api_url: api_url
                .filter(|url| !url.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        })
    }

    /// Resolve a context from explicit values.
    ///
    /// # Errors
    ///
    /// Returns a description of what is missing when the slug is malformed
    /// or the token is empty.
    pub fn resolve(repository: &str, token: &str, api_url: Option<String>) -> Result<Self, String> {
        if parse_repo(repository).is_none() {
            return Err(format!(
                "Invalid repository '{repository}', expected owner/repo"
            ));
        }
        if token.trim().is_empty() {
            return Err("GITHUB_TOKEN is not set or empty".to_string());
        }

        let context = Self::new(repository, token, api_url)
            .ok_or_else(|| "Incomplete GitHub context".to_string())?;
        debug!(repository = %context.slug(), api_url = %context.api_url, "Resolved GitHub context");
        Ok(context)
    }

    /// `owner/repo`
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

// Never print the token
impl std::fmt::Debug for GitHubContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubContext")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"[REDACTED]")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Split an `owner/repo` slug
#[must_use]
pub fn parse_repo(repo_str: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = repo_str.trim().split('/').collect();
    match parts.as_slice() {
        [owner, repo] if !owner.is_empty() && !repo.is_empty() => {
            Some(((*owner).to_string(), (*repo).to_string()))
        }
        _ => None,
    }
}
