//! Command-line interface for appkeeper.
//!
//! Each subcommand lives in its own module with its own argument struct and
//! execution logic:
//!
//! - `check` - report available updates without downloading anything
//! - `update` - download, verify, and install available updates
//! - `list` - show tracked applications and their installed versions
//!
//! # Global options
//!
//! All subcommands support:
//! - `--verbose` - debug-level output
//! - `--quiet` - errors only
//! - `--config` - path to a custom configuration file
//!
//! ```bash
//! appkeeper check
//! appkeeper update MyApp
//! appkeeper --config ./test-config.toml update --dry-run
//! ```
//!
//! The exit code is 0 when every tracked application completed without
//! error, and 1 when any application failed; one failing application never
//! aborts the others.

mod check;
mod list;
mod update;

use crate::config::{Config, TrackedApplication};
use crate::core::AppkeeperError;
use crate::report::{AppOutcome, RunSummary};
use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

/// Top-level CLI: global flags plus the subcommand to run.
#[derive(Parser)]
#[command(
    name = "appkeeper",
    about = "Tracks upstream releases and keeps locally installed artifacts up to date",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output (debug-level logging).
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file (default:
    /// `~/.config/appkeeper/config.toml`, or `APPKEEPER_CONFIG`).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Check for available updates without downloading anything.
    Check(check::CheckCommand),

    /// Download, verify, and install available updates.
    Update(update::UpdateCommand),

    /// List tracked applications and their installed versions.
    List(list::ListCommand),
}

impl Cli {
    /// Set up logging, load the configuration, and dispatch the subcommand.
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let path = match &self.config {
            Some(path) => path.clone(),
            None => Config::default_path()?,
        };
        let config = Config::load(&path)?;
        tracing::debug!(
            "loaded {} tracked application(s) from {}",
            config.applications.len(),
            path.display()
        );

        match self.command {
            Commands::Check(cmd) => cmd.execute(config).await,
            Commands::Update(cmd) => cmd.execute(config).await,
            Commands::List(cmd) => cmd.execute(&config),
        }
    }

    /// Logging goes to stderr so report output on stdout stays scriptable.
    /// `RUST_LOG` overrides the flag-derived filter.
    fn init_logging(&self) {
        let default = if self.verbose {
            "appkeeper=debug"
        } else if self.quiet {
            "error"
        } else {
            "appkeeper=info"
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

/// Resolve the applications a command operates on. Names must match tracked
/// applications exactly; an unknown name is a configuration error, not a
/// silent no-op.
fn select_apps(config: &Config, names: &[String]) -> Result<Vec<TrackedApplication>> {
    if names.is_empty() {
        return Ok(config.applications.clone());
    }
    let mut selected = Vec::with_capacity(names.len());
    for name in names {
        let app = config
            .applications
            .iter()
            .find(|a| a.name == *name)
            .ok_or_else(|| AppkeeperError::Config {
                message: format!("no tracked application named '{name}'"),
            })?;
        selected.push(app.clone());
    }
    Ok(selected)
}

/// Convert a per-application error into a report outcome, preserving the
/// error category for the summary line.
fn failed_outcome(error: anyhow::Error) -> AppOutcome {
    let kind = error
        .downcast_ref::<AppkeeperError>()
        .map_or("other", AppkeeperError::kind);
    AppOutcome::Failed {
        kind: kind.to_string(),
        reason: format!("{error:#}"),
    }
}

/// Render the per-application reports and the summary footer to stdout.
fn render_summary(summary: &RunSummary) {
    for report in &summary.reports {
        match &report.outcome {
            AppOutcome::UpToDate { current } => {
                let version = current.as_deref().unwrap_or("unknown version");
                println!("  {} {} ({version})", "✓".green(), report.name.bold());
            }
            AppOutcome::UpdateAvailable {
                current,
                latest,
                asset,
            } => {
                let from = current.as_deref().unwrap_or("none");
                println!(
                    "  {} {} {from} -> {} ({asset})",
                    "↑".yellow(),
                    report.name.bold(),
                    latest.yellow()
                );
            }
            AppOutcome::Installed {
                version,
                path,
                verification,
                bytes,
                elapsed,
            } => {
                println!(
                    "  {} {} {} -> {} [{}, {} in {:.1}s]",
                    "✓".green(),
                    report.name.bold(),
                    version.green(),
                    path.display(),
                    verification_label(*verification),
                    format_bytes(*bytes),
                    elapsed.as_secs_f64()
                );
            }
            AppOutcome::Failed { kind, reason } => {
                println!("  {} {} [{kind}] {reason}", "✗".red(), report.name.bold());
            }
        }
    }
    println!(
        "\n{} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
}

/// Exit nonzero when any application failed. Outcomes were already rendered;
/// there is nothing further to report.
fn finish(summary: &RunSummary) -> Result<()> {
    if summary.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn verification_label(status: crate::checksum::VerifyStatus) -> &'static str {
    match status {
        crate::checksum::VerifyStatus::Verified => "verified",
        crate::checksum::VerifyStatus::Failed => "checksum failed",
        crate::checksum::VerifyStatus::Skipped | crate::checksum::VerifyStatus::NotRequired => {
            "unverified"
        }
    }
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
