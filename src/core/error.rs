//! Error types and user-facing error reporting.
//!
//! Two layers: [`AppkeeperError`] enumerates the failure categories the
//! pipeline distinguishes (transient network, permanent network,
//! compatibility, checksum, filesystem, configuration), and [`ErrorContext`]
//! wraps one with an optional suggestion and details for CLI display.
//! Failures are scoped to a single tracked application; only configuration
//! errors abort a run.

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// Failure categories for appkeeper operations.
///
/// The category determines retry and propagation behavior: transient network
/// errors are retried with backoff, everything else fails the affected
/// application immediately and the run continues.
#[derive(Debug, Error)]
pub enum AppkeeperError {
    /// Transient network failure (timeout, connection reset, 5xx, 429).
    /// Surfaced only after the retry budget is exhausted.
    #[error("network error after {attempts} attempts: {url}")]
    NetworkTransient {
        /// The URL that failed.
        url: String,
        /// Attempts made before giving up.
        attempts: u32,
        /// The final underlying failure.
        reason: String,
    },

    /// Permanent network failure (4xx other than 429, malformed body, DNS).
    /// Never retried.
    #[error("request failed: {url} ({reason})")]
    NetworkPermanent {
        /// The URL that failed.
        url: String,
        /// Why the request cannot succeed.
        reason: String,
    },

    /// No repository client implementation claims the source URL.
    #[error("unsupported source url: {url}")]
    UnsupportedSource {
        /// The URL no client detected.
        url: String,
    },

    /// No release asset is usable on this machine, or several are tied.
    #[error("no usable asset for '{app}': {reason}")]
    Compatibility {
        /// The tracked application affected.
        app: String,
        /// Which assets conflicted or were missing.
        reason: String,
    },

    /// Downloaded bytes did not match the companion checksum.
    #[error("checksum mismatch for {file}")]
    ChecksumMismatch {
        /// The file that failed verification.
        file: String,
    },

    /// Checksum policy is `required` but no checksum artifact exists.
    #[error("checksum required but unavailable for '{app}'")]
    ChecksumUnavailable {
        /// The tracked application affected.
        app: String,
    },

    /// Rename, symlink, or temp-file failure during installation.
    #[error("filesystem error at {path}: {reason}")]
    FileSystem {
        /// The path involved.
        path: String,
        /// The underlying failure.
        reason: String,
    },

    /// Configuration cannot be read or is invalid. Run-level fatal.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the problem.
        message: String,
    },

    /// An archive was downloaded but no installable entry was found inside.
    #[error("no installable entry in archive {archive}")]
    EmptyArchive {
        /// The archive that was inspected.
        archive: String,
    },

    /// The run was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,

    /// Wrapped I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppkeeperError {
    /// Short stable category name, reported alongside the human-readable
    /// reason in per-application outcome records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkTransient { .. } => "network-transient",
            Self::NetworkPermanent { .. } => "network",
            Self::UnsupportedSource { .. } => "unsupported-source",
            Self::Compatibility { .. } => "compatibility",
            Self::ChecksumMismatch { .. } | Self::ChecksumUnavailable { .. } => "checksum",
            Self::FileSystem { .. } | Self::Io(_) => "filesystem",
            Self::Config { .. } => "config",
            Self::EmptyArchive { .. } => "archive",
            Self::Cancelled => "cancelled",
        }
    }
}

/// An [`AppkeeperError`] with optional remediation hints for CLI display.
pub struct ErrorContext {
    /// The underlying error.
    pub error: AppkeeperError,
    /// Optional suggestion for resolving the error.
    pub suggestion: Option<String>,
    /// Optional additional details.
    pub details: Option<String>,
}

impl ErrorContext {
    /// Wrap an error without hints.
    pub fn new(error: AppkeeperError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Attach a remediation suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach further details.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with color.
    pub fn display(&self) {
        eprintln!("{} {}", "error:".red().bold(), self.error);
        if let Some(details) = &self.details {
            eprintln!("  {details}");
        }
        if let Some(suggestion) = &self.suggestion {
            eprintln!("  {} {suggestion}", "hint:".yellow());
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, "\n  {details}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  hint: {suggestion}")?;
        }
        Ok(())
    }
}

/// Convert any error into an [`ErrorContext`] with a category-appropriate
/// suggestion attached.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let error = match error.downcast::<AppkeeperError>() {
        Ok(e) => e,
        Err(other) => AppkeeperError::Config {
            message: format!("{other:#}"),
        },
    };

    let ctx = ErrorContext::new(error);
    match &ctx.error {
        AppkeeperError::Config { .. } => ctx.with_suggestion(
            "check the configuration file (default ~/.config/appkeeper/config.toml), or pass --config",
        ),
        AppkeeperError::NetworkTransient { .. } => {
            ctx.with_suggestion("the failure may be temporary; retry later")
        }
        AppkeeperError::UnsupportedSource { .. } => ctx.with_suggestion(
            "supported sources are GitHub repository URLs and direct artifact URLs",
        ),
        AppkeeperError::ChecksumUnavailable { .. } => ctx.with_suggestion(
            "set checksum.required = false for this application to allow unverified downloads",
        ),
        _ => ctx,
    }
}
