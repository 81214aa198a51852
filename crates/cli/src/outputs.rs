//! Step outputs for GitHub Actions.
//!
//! Outputs are appended as `key=value` lines to the file named by
//! `GITHUB_OUTPUT`. Outside of Actions they are printed to stdout instead.

use crate::cli::CliError;
use cachequota_core::CleanupReport;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Whether entries were actually deleted
pub const CLEANUP_PERFORMED: &str = "cleanup-performed";
/// Megabytes freed (or that would be freed, in a dry run)
pub const SPACE_FREED: &str = "space-freed";
/// How the run ended
pub const CLEANUP_STATUS: &str = "cleanup-status";

/// Ordered list of step outputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutputs {
    entries: Vec<(String, String)>,
}

impl StepOutputs {
    /// Create an empty output set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Outputs for a finished cleanup
    #[must_use]
    pub fn from_report(report: &CleanupReport) -> Self {
        Self::new()
            .with(CLEANUP_PERFORMED, report.cleanup_performed())
            .with(SPACE_FREED, report.space_freed_mb())
            .with(CLEANUP_STATUS, report.status)
    }

    /// Add an output
    #[must_use]
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.entries.push((key.to_string(), value.to_string()));
        self
    }

    /// `key=value` lines, one per output
    #[must_use]
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| format!("{k}={v}\n"))
            .collect()
    }
}

/// Where step outputs are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSink {
    /// Append to a file (`GITHUB_OUTPUT`)
    File(PathBuf),
    /// Print to stdout
    Stdout,
}

impl OutputSink {
    /// Sink for the current environment
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var_os("GITHUB_OUTPUT") {
            Some(path) if !path.is_empty() => Self::File(PathBuf::from(path)),
            _ => Self::Stdout,
        }
    }

    /// Write `outputs` to this sink.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Output`] when the output file cannot be opened or
    /// written.
    pub fn write(&self, outputs: &StepOutputs) -> Result<(), CliError> {
        let rendered = outputs.render();
        match self {
            Self::File(path) => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| CliError::output(format!("{}: {e}", path.display())))?;
                file.write_all(rendered.as_bytes())
                    .map_err(|e| CliError::output(format!("{}: {e}", path.display())))?;
                debug!(path = %path.display(), "Wrote step outputs");
            }
            Self::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout
                    .write_all(rendered.as_bytes())
                    .and_then(|()| stdout.flush())
                    .map_err(|e| CliError::output(format!("stdout: {e}")))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cachequota_core::{CleanupResult, CleanupStatus, InventoryStats, NeedsCleanup};

    fn report(dry_run: bool, status: CleanupStatus, deleted: usize, freed_mb: u64) -> CleanupReport {
        CleanupReport {
            status,
            reason: NeedsCleanup::ExceedsThreshold,
            attempts: 1,
            dry_run,
            inventory: InventoryStats::default(),
            result: CleanupResult {
                bytes_freed: freed_mb * 1024 * 1024,
                entries_deleted: deleted,
                ..CleanupResult::default()
            },
        }
    }

    #[test]
    fn test_outputs_from_report() {
        let outputs = StepOutputs::from_report(&report(false, CleanupStatus::Completed, 2, 1300));
        assert_eq!(
            outputs.render(),
            "cleanup-performed=true\nspace-freed=1300\ncleanup-status=completed\n"
        );
    }

    #[test]
    fn test_dry_run_is_not_a_performed_cleanup() {
        let outputs = StepOutputs::from_report(&report(true, CleanupStatus::Completed, 2, 1300));
        assert_eq!(
            outputs.render(),
            "cleanup-performed=false\nspace-freed=1300\ncleanup-status=completed\n"
        );
    }

    #[test]
    fn test_unavailable_differs_from_healthy() {
        let unavailable = StepOutputs::from_report(&report(false, CleanupStatus::Unavailable, 0, 0));
        let healthy = StepOutputs::from_report(&report(false, CleanupStatus::Healthy, 0, 0));
        assert_eq!(
            unavailable.render(),
            "cleanup-performed=false\nspace-freed=0\ncleanup-status=unavailable\n"
        );
        assert_eq!(
            healthy.render(),
            "cleanup-performed=false\nspace-freed=0\ncleanup-status=healthy\n"
        );
    }

    #[test]
    fn test_file_sink_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github_output");
        std::fs::write(&path, "existing=1\n").unwrap();

        let sink = OutputSink::File(path.clone());
        sink.write(&StepOutputs::new().with(SPACE_FREED, 12)).unwrap();
        sink.write(&StepOutputs::new().with(CLEANUP_PERFORMED, true)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "existing=1\nspace-freed=12\ncleanup-performed=true\n");
    }

    #[test]
    fn test_unwritable_file_is_an_output_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputSink::File(dir.path().join("missing").join("github_output"));
        let err = sink.write(&StepOutputs::new().with(SPACE_FREED, 0)).unwrap_err();
        assert!(matches!(err, CliError::Output { .. }));
    }

    #[test]
    fn test_sink_from_env() {
        temp_env::with_var("GITHUB_OUTPUT", Some("/tmp/out"), || {
            assert_eq!(OutputSink::from_env(), OutputSink::File(PathBuf::from("/tmp/out")));
        });
        temp_env::with_var("GITHUB_OUTPUT", Some(""), || {
            assert_eq!(OutputSink::from_env(), OutputSink::Stdout);
        });
        temp_env::with_var_unset("GITHUB_OUTPUT", || {
            assert_eq!(OutputSink::from_env(), OutputSink::Stdout);
        });
    }
}
