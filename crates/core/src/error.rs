//! Error types for the eviction engine

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Failure of a single call against the remote cache store.
///
/// The variants carry enough classification for [`crate::retry::RetryPolicy`]
/// to decide whether another attempt is worthwhile.
#[derive(Error, Debug, Diagnostic)]
pub enum StoreError {
    /// The entry (or the listing endpoint) does not exist
    #[error("Remote cache resource not found: {resource}")]
    #[diagnostic(
        code(cachequota::store::not_found),
        help("The entry was most likely deleted by a concurrent cleanup")
    )]
    NotFound {
        /// Route or entry identifier that was not found
        resource: String,
    },

    /// Remote tooling is missing or cannot be constructed
    #[error("Remote cache unavailable: {message}")]
    #[diagnostic(
        code(cachequota::store::unavailable),
        help("Set GITHUB_TOKEN and GITHUB_REPOSITORY to enable cache cleanup")
    )]
    Unavailable {
        /// Why the store cannot be reached
        message: String,
    },

    /// The API answered with a non-success status
    #[error("Remote cache API returned HTTP {status}: {message}")]
    #[diagnostic(code(cachequota::store::status))]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The request never produced a response
    #[error("Remote cache transport error: {message}")]
    #[diagnostic(
        code(cachequota::store::transport),
        help("Check network connectivity to the API endpoint")
    )]
    Transport {
        /// Underlying client error
        message: String,
    },

    /// The response body could not be parsed
    #[error("Malformed remote cache response: {message}")]
    #[diagnostic(code(cachequota::store::malformed))]
    Malformed {
        /// Parse failure description
        message: String,
    },

    /// Every attempt allowed by the retry policy failed
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    #[diagnostic(code(cachequota::store::retry_exhausted))]
    RetryExhausted {
        /// Operation name used in logs
        operation: String,
        /// Number of attempts made
        attempts: usize,
        /// Message of the final failure
        last_error: String,
    },
}

impl StoreError {
    /// Create a not-found error
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Create an unavailable error
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable {
            message: msg.into(),
        }
    }

    /// Create an HTTP status error
    #[must_use]
    pub fn status(status: u16, msg: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: msg.into(),
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    /// Create a malformed-response error
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed {
            message: msg.into(),
        }
    }

    /// Create a retry-exhausted error
    #[must_use]
    pub fn retry_exhausted(
        operation: impl Into<String>,
        attempts: usize,
        last_error: impl Into<String>,
    ) -> Self {
        Self::RetryExhausted {
            operation: operation.into(),
            attempts,
            last_error: last_error.into(),
        }
    }

    /// Whether this error means the resource is already gone
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether another attempt could succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            // Server errors, rate limiting and request timeouts
            Self::Status { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            Self::NotFound { .. }
            | Self::Unavailable { .. }
            | Self::Malformed { .. }
            | Self::RetryExhausted { .. } => false,
        }
    }
}

/// Error type for engine operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Invalid eviction configuration
    #[error("Eviction configuration error: {message}")]
    #[diagnostic(code(cachequota::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;
