//! Structured per-application outcome records.
//!
//! The pipeline emits data, not formatted text; the CLI renders these
//! records. Every terminal outcome, including errors, carries a
//! human-readable reason distinct from its category.

use crate::checksum::VerifyStatus;
use std::path::PathBuf;
use std::time::Duration;

/// Terminal outcome for one tracked application in one cycle.
#[derive(Debug)]
pub enum AppOutcome {
    /// Installed artifact is already the latest release.
    UpToDate {
        /// Currently detected version, when known.
        current: Option<String>,
    },
    /// A newer release exists; reported without downloading (dry run).
    UpdateAvailable {
        /// Currently detected version, when known.
        current: Option<String>,
        /// Latest remote version.
        latest: String,
        /// Asset that would be fetched.
        asset: String,
    },
    /// Artifact downloaded, verified per policy, and installed.
    Installed {
        /// Version now installed.
        version: String,
        /// Final path of the installed artifact.
        path: PathBuf,
        /// Checksum verification status.
        verification: VerifyStatus,
        /// Bytes transferred.
        bytes: u64,
        /// Wall-clock transfer time.
        elapsed: Duration,
    },
    /// The application failed; the run continued without it.
    Failed {
        /// Error category (short, stable).
        kind: String,
        /// Human-readable cause.
        reason: String,
    },
}

/// Outcome record for one application.
#[derive(Debug)]
pub struct AppReport {
    /// The tracked application's name.
    pub name: String,
    /// What happened.
    pub outcome: AppOutcome,
}

impl AppReport {
    /// Whether this outcome counts as a failure in the run summary.
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, AppOutcome::Failed { .. })
    }
}

/// Aggregate of one run over all tracked applications.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Per-application reports, in configuration order.
    pub reports: Vec<AppReport>,
}

impl RunSummary {
    /// Record one application's outcome.
    pub fn push(&mut self, report: AppReport) {
        self.reports.push(report);
    }

    /// Count of applications that completed without error.
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| !r.is_failure()).count()
    }

    /// Count of applications that failed.
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|r| r.is_failure()).count()
    }
}
