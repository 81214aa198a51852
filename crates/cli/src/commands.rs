//! Subcommand implementations.
//!
//! Every command takes its [`CacheStore`] as an argument; [`execute`] wires
//! in the GitHub store detected from the environment.

use crate::cli::{Cli, CliError, Commands, OkEnvelope, QuotaArgs};
use crate::outputs::{OutputSink, StepOutputs};
use cachequota_core::{
    Availability, BYTES_PER_MB, CacheStore, CleanupOrchestrator, CleanupReport, EvictionConfig,
    EvictionPlan, NeedsCleanup, RemoteCacheClient, SizeEstimate, estimate_patterns,
};
use cachequota_github::{GitHubContext, store_from_context};
use serde::Serialize;
use std::sync::Arc;
use tracing::{Instrument, info, warn};

/// Run the parsed command line against the GitHub cache of the current
/// repository.
///
/// # Errors
///
/// Returns a [`CliError`] only for invalid configuration or when results
/// cannot be written. Remote failures are reported through the cleanup
/// status instead.
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let span = crate::command_span!(cli.command.name());
    let json = cli.json;
    let quota = cli.quota;

    async move {
        match cli.command {
            Commands::PreSave {
                key,
                path,
                projected_mb,
            } => {
                let projected = projected_bytes(path.as_deref(), projected_mb);
                let store = github_store(&quota);
                let report = pre_save(store, &quota, key.as_deref(), projected).await?;
                publish(&report, &OutputSink::from_env(), json)
            }
            Commands::Cleanup { key } => {
                let store = github_store(&quota);
                let report = cleanup(store, &quota, key.as_deref()).await?;
                publish(&report, &OutputSink::from_env(), json)
            }
            Commands::Status { key } => {
                let store = github_store(&quota);
                let summary = status(store, &quota, key.as_deref()).await?;
                if json {
                    print_json(&OkEnvelope::new(&summary))
                } else {
                    print!("{}", summary.render());
                    Ok(())
                }
            }
            Commands::Estimate { paths } => {
                let estimate = estimate(&paths);
                if json {
                    print_json(&OkEnvelope::new(&estimate))
                } else {
                    println!("{}", estimate.estimated_mb);
                    Ok(())
                }
            }
        }
    }
    .instrument(span)
    .await
}

/// Eviction configuration for the given quota flags
#[must_use]
pub fn eviction_config(quota: &QuotaArgs) -> EvictionConfig {
    EvictionConfig::default()
        .max_size_gb(quota.max_size_gb)
        .dry_run(quota.dry_run)
}

/// Resolve the GitHub context from flags, falling back to `GH_TOKEN`.
///
/// # Errors
///
/// Returns a description of the missing setting.
pub fn github_context(quota: &QuotaArgs) -> Result<GitHubContext, String> {
    let repository = quota
        .repository
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .ok_or_else(|| "GITHUB_REPOSITORY is not set".to_string())?;
    let token = quota
        .token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| std::env::var("GH_TOKEN").ok())
        .unwrap_or_default();

    GitHubContext::resolve(repository, &token, quota.api_url.clone())
}

fn github_store(quota: &QuotaArgs) -> Arc<dyn CacheStore> {
    store_from_context(github_context(quota))
}

fn orchestrator(
    store: Arc<dyn CacheStore>,
    quota: &QuotaArgs,
) -> Result<CleanupOrchestrator, CliError> {
    let client = RemoteCacheClient::new(store);
    CleanupOrchestrator::new(client, eviction_config(quota)).map_err(CliError::from)
}

/// Projected size of the entry about to be saved.
///
/// An explicit size wins over measuring `path`. Without either, nothing is
/// projected and only current usage is checked.
#[must_use]
pub fn projected_bytes(path: Option<&str>, projected_mb: Option<u64>) -> u64 {
    if let Some(mb) = projected_mb {
        return mb.saturating_mul(BYTES_PER_MB);
    }

    match path {
        Some(path) if !path.trim().is_empty() => {
            let estimate = estimate_patterns(path);
            info!(
                raw_mb = estimate.raw_mb,
                estimated_mb = estimate.estimated_mb,
                measured = estimate.measured_paths,
                missing = estimate.missing_paths,
                "Estimated size of the entry to save"
            );
            estimate.estimated_bytes()
        }
        _ => {
            warn!("No paths or projected size given, checking current usage only");
            0
        }
    }
}

/// Single cleanup pass before saving an entry of `projected` bytes.
///
/// # Errors
///
/// Returns a configuration error for an invalid quota.
pub async fn pre_save(
    store: Arc<dyn CacheStore>,
    quota: &QuotaArgs,
    key: Option<&str>,
    projected: u64,
) -> Result<CleanupReport, CliError> {
    let orchestrator = orchestrator(store, quota)?;
    Ok(orchestrator.pre_save(key, projected).await)
}

/// Repository-wide cleanup.
///
/// # Errors
///
/// Returns a configuration error for an invalid quota.
pub async fn cleanup(
    store: Arc<dyn CacheStore>,
    quota: &QuotaArgs,
    key: Option<&str>,
) -> Result<CleanupReport, CliError> {
    let orchestrator = orchestrator(store, quota)?;
    Ok(orchestrator.repository_wide(key).await)
}

/// Cache usage and the planner's decision, without deleting anything
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    /// Store the inventory came from
    pub scope: String,
    /// Whether the inventory could be fetched
    pub available: bool,
    /// Why the inventory could not be fetched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
    /// Entries in the store
    pub entries: usize,
    /// Current usage in megabytes
    pub total_mb: u64,
    /// Quota in megabytes
    pub max_mb: u64,
    /// Cleanup threshold in megabytes
    pub threshold_mb: u64,
    /// Planner decision
    pub needs_cleanup: NeedsCleanup,
    /// Megabytes a cleanup would need to free
    pub target_mb: u64,
    /// Entries eligible for eviction
    pub candidates: usize,
}

impl StatusSummary {
    /// Human-readable rendering
    #[must_use]
    pub fn render(&self) -> String {
        if let Some(reason) = &self.unavailable_reason {
            return format!("Cache {}: unavailable ({reason})\n", self.scope);
        }

        let mut out = format!(
            "Cache {}: {} entries, {} MB of {} MB (threshold {} MB)\n",
            self.scope, self.entries, self.total_mb, self.max_mb, self.threshold_mb
        );
        if self.needs_cleanup.is_required() {
            out.push_str(&format!(
                "Cleanup needed ({}): free {} MB from {} candidates\n",
                self.needs_cleanup, self.target_mb, self.candidates
            ));
        } else {
            out.push_str("No cleanup needed\n");
        }
        out
    }
}

/// Fetch the inventory and evaluate it.
///
/// # Errors
///
/// Returns a configuration error for an invalid quota.
pub async fn status(
    store: Arc<dyn CacheStore>,
    quota: &QuotaArgs,
    key: Option<&str>,
) -> Result<StatusSummary, CliError> {
    let config = eviction_config(quota);
    config.validate()?;
    let client = RemoteCacheClient::new(store).with_retry(config.retry.clone());
    let inventory = client.list_entries().await;
    let stats = inventory.stats();

    let mut summary = StatusSummary {
        scope: client.scope(),
        available: inventory.is_available(),
        unavailable_reason: None,
        entries: stats.count,
        total_mb: stats.total_bytes / BYTES_PER_MB,
        max_mb: config.max_bytes() / BYTES_PER_MB,
        threshold_mb: config.threshold_bytes() / BYTES_PER_MB,
        needs_cleanup: NeedsCleanup::None,
        target_mb: 0,
        candidates: 0,
    };

    if let Availability::Unavailable { reason } = inventory.availability() {
        summary.unavailable_reason = Some(reason.clone());
        return Ok(summary);
    }

    if let Some(plan) = EvictionPlan::build(stats, &config, key, None) {
        summary.needs_cleanup = plan.reason;
        summary.target_mb = plan.target_bytes.div_ceil(BYTES_PER_MB);
        summary.candidates = inventory.candidates(plan.exclude_key.as_deref()).len();
    }
    Ok(summary)
}

/// Buffered size estimate of `paths`
#[must_use]
pub fn estimate(paths: &[String]) -> SizeEstimate {
    estimate_patterns(&paths.join("\n"))
}

/// Write the report's step outputs, and the report itself in JSON mode.
///
/// In JSON mode without `GITHUB_OUTPUT`, stdout carries only the JSON report.
///
/// # Errors
///
/// Returns an output error when writing fails.
pub fn publish(report: &CleanupReport, sink: &OutputSink, json: bool) -> Result<(), CliError> {
    if json {
        print_json(&OkEnvelope::new(report))?;
        if *sink == OutputSink::Stdout {
            return Ok(());
        }
    }
    sink.write(&StepOutputs::from_report(report))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::other(format!("JSON serialization failed: {e}")))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota() -> QuotaArgs {
        QuotaArgs {
            max_size_gb: 8,
            ..QuotaArgs::default()
        }
    }

    #[test]
    fn test_eviction_config_from_flags() {
        let config = eviction_config(&QuotaArgs {
            max_size_gb: 10,
            dry_run: true,
            ..QuotaArgs::default()
        });
        assert_eq!(config.max_size_gb, 10);
        assert!(config.dry_run);
        assert_eq!(config.max_deletions_per_attempt, 5);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_projected_bytes_prefers_explicit_size() {
        assert_eq!(projected_bytes(Some("target"), Some(3)), 3 * BYTES_PER_MB);
        assert_eq!(projected_bytes(None, None), 0);
        assert_eq!(projected_bytes(Some("  \n"), None), 0);
    }

    #[test]
    fn test_projected_bytes_measures_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob"), vec![0u8; 3 * 1024 * 1024]).unwrap();

        let path = dir.path().display().to_string();
        // 3 MB plus 25%, rounded down
        assert_eq!(projected_bytes(Some(&path), None), 3 * BYTES_PER_MB);

        let missing = dir.path().join("missing").display().to_string();
        assert_eq!(projected_bytes(Some(&missing), None), 0);
    }

    #[test]
    fn test_github_context_requires_repository() {
        let err = github_context(&QuotaArgs {
            token: Some("ghs_example".to_string()),
            ..quota()
        })
        .unwrap_err();
        assert!(err.contains("GITHUB_REPOSITORY"));
    }

    #[test]
    fn test_github_context_falls_back_to_gh_token() {
        temp_env::with_var("GH_TOKEN", Some("gho_fallback"), || {
            let context = github_context(&QuotaArgs {
                repository: Some("o/r".to_string()),
                ..quota()
            })
            .unwrap();
            assert_eq!(context.token, "gho_fallback");
        });
        temp_env::with_var_unset("GH_TOKEN", || {
            let err = github_context(&QuotaArgs {
                repository: Some("o/r".to_string()),
                token: Some(String::new()),
                ..quota()
            })
            .unwrap_err();
            assert!(err.contains("GITHUB_TOKEN"));
        });
    }

    #[test]
    fn test_status_summary_render() {
        let summary = StatusSummary {
            scope: "github:o/r".to_string(),
            available: true,
            unavailable_reason: None,
            entries: 3,
            total_mb: 7680,
            max_mb: 8192,
            threshold_mb: 6553,
            needs_cleanup: NeedsCleanup::ExceedsThreshold,
            target_mb: 1127,
            candidates: 2,
        };
        let text = summary.render();
        assert!(text.contains("7680 MB of 8192 MB"));
        assert!(text.contains("free 1127 MB from 2 candidates"));

        let unavailable = StatusSummary {
            available: false,
            unavailable_reason: Some("GITHUB_TOKEN is not set or empty".to_string()),
            ..summary
        };
        assert!(unavailable.render().contains("unavailable"));
    }
}
