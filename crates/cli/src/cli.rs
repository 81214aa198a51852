use crate::tracing::{LogLevel, TracingFormat};
use clap::{Args, Parser, Subcommand};
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI or configuration error exit code
pub const EXIT_CLI: i32 = 2;
/// Internal error exit code (unwritable outputs, serialization failures)
pub const EXIT_INTERNAL: i32 = 3;

/// CLI-specific error types with proper exit code mapping
///
/// Remote failures never surface here: an unreachable or misbehaving cache
/// API is reported through the cleanup status and the run still succeeds.
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// CLI or configuration error (exit code 2)
    #[error("CLI/configuration error: {message}")]
    #[diagnostic(code(cachequota::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Writing step outputs failed (exit code 3)
    #[error("Failed to write outputs: {message}")]
    #[diagnostic(
        code(cachequota::cli::output),
        help("Check that GITHUB_OUTPUT points to a writable file")
    )]
    Output {
        /// The error message
        message: String,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(cachequota::cli::other))]
    Other {
        /// The error message
        message: String,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new output error
    #[must_use]
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Convert `cachequota_core::Error` to the matching `CliError` variant.
impl From<cachequota_core::Error> for CliError {
    fn from(err: cachequota_core::Error) -> Self {
        match err {
            // Extract just the message to avoid "Configuration error: Configuration error:"
            cachequota_core::Error::Configuration { message } => Self::config_with_help(
                message,
                "Check --max-size-gb / CACHE_MAX_SIZE_GB",
            ),
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Output { .. } | CliError::Other { .. } => EXIT_INTERNAL,
    }
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": match err {
                CliError::Config { .. } => "config",
                CliError::Output { .. } => "output",
                CliError::Other { .. } => "other",
            },
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Keeps a GitHub Actions cache under its size quota.
///
/// Evicts least recently used entries once usage crosses 80% of the quota,
/// either right before a new entry is saved or across the whole repository.
#[derive(Parser, Debug)]
#[command(name = "cachequota")]
#[command(about = "Keeps a GitHub Actions cache under its size quota")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        help = "Set logging level",
        default_value = "info",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format.
    #[arg(
        long,
        global = true,
        help = "Set log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    /// Emit a JSON envelope on stdout.
    #[arg(long, global = true, help = "Emit a JSON envelope on stdout")]
    pub json: bool,

    /// Quota and remote settings shared by every subcommand.
    #[command(flatten)]
    pub quota: QuotaArgs,
}

/// Quota and remote cache settings.
#[derive(Args, Debug, Clone, Default)]
pub struct QuotaArgs {
    /// Repository cache quota in gigabytes.
    #[arg(
        long,
        global = true,
        env = "CACHE_MAX_SIZE_GB",
        default_value_t = cachequota_core::config::DEFAULT_MAX_SIZE_GB,
        help = "Repository cache quota in gigabytes"
    )]
    pub max_size_gb: u64,

    /// Report planned deletions without deleting anything.
    #[arg(
        long,
        global = true,
        env = "CACHE_DRY_RUN",
        value_parser = clap::builder::BoolishValueParser::new(),
        help = "Report planned deletions without deleting anything"
    )]
    pub dry_run: bool,

    /// Repository as owner/repo.
    #[arg(
        long,
        global = true,
        env = "GITHUB_REPOSITORY",
        value_name = "OWNER/REPO",
        help = "Repository whose cache is managed"
    )]
    pub repository: Option<String>,

    /// Token allowed to manage Actions caches.
    #[arg(
        long,
        global = true,
        env = "GITHUB_TOKEN",
        hide_env_values = true,
        help = "Token with actions: write permission (falls back to GH_TOKEN)"
    )]
    pub token: Option<String>,

    /// REST API base URL.
    #[arg(
        long,
        global = true,
        env = "GITHUB_API_URL",
        help = "REST API base URL (GitHub Enterprise Server)"
    )]
    pub api_url: Option<String>,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Free room for an entry that is about to be saved.
    #[command(about = "Free room for an entry that is about to be saved")]
    PreSave {
        /// Key of the entry being saved; never evicted.
        #[arg(long, env = "CACHE_KEY", help = "Key of the entry being saved")]
        key: Option<String>,

        /// Paths that make up the entry, one per line.
        #[arg(
            long,
            env = "CACHE_PATH",
            help = "Paths that make up the entry, one per line (globs, ~ and !exclusions allowed)",
            conflicts_with = "projected_mb"
        )]
        path: Option<String>,

        /// Projected entry size in megabytes, instead of measuring paths.
        #[arg(long, help = "Projected entry size in megabytes")]
        projected_mb: Option<u64>,
    },
    /// Evict least recently used entries until usage is under the threshold.
    #[command(about = "Evict least recently used entries across the repository")]
    Cleanup {
        /// Key protected from eviction.
        #[arg(long, env = "CACHE_KEY", help = "Key protected from eviction")]
        key: Option<String>,
    },
    /// Show cache usage and whether cleanup is needed.
    #[command(about = "Show cache usage and whether cleanup is needed")]
    Status {
        /// Key protected from eviction.
        #[arg(long, env = "CACHE_KEY", help = "Key protected from eviction")]
        key: Option<String>,
    },
    /// Estimate the stored size of a set of paths.
    #[command(about = "Estimate the stored size of a set of paths")]
    Estimate {
        /// Paths or glob patterns.
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<String>,
    },
}

impl Commands {
    /// Subcommand name used in spans and logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PreSave { .. } => "pre-save",
            Self::Cleanup { .. } => "cleanup",
            Self::Status { .. } => "status",
            Self::Estimate { .. } => "estimate",
        }
    }
}

/// Parse command-line arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
