//! Download, verify, and install available updates.
//!
//! The full pipeline for each selected application: check for an update,
//! download the chosen asset with bounded concurrency, verify it per the
//! checksum policy, extract archives, and rotate it into place. Failures are
//! scoped to their application; the summary and exit code reflect them.

use crate::checker::{CheckOutcome, UpdateCandidate, UpdateChecker};
use crate::compat::CompatibilityDescriptor;
use crate::config::Config;
use crate::core::CancelFlag;
use crate::download::{DownloadOrchestrator, DownloadResult};
use crate::report::{AppOutcome, AppReport, RunSummary};
use crate::rotation::{InstallRequest, RotationManager, Sidecar};
use crate::{net, repository};
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use std::collections::HashMap;

/// Arguments for the `update` command.
#[derive(Args)]
pub struct UpdateCommand {
    /// Applications to update (all tracked applications when empty).
    names: Vec<String>,

    /// Show what would be updated without downloading or installing.
    #[arg(long)]
    dry_run: bool,
}

impl UpdateCommand {
    /// Execute the update pipeline over the selected applications.
    pub async fn execute(self, config: Config) -> Result<()> {
        let apps = super::select_apps(&config, &self.names)?;
        let http = net::build_client(&config.settings)?;
        let clients = repository::default_clients(http.clone(), config.settings.max_retries);
        let descriptor = CompatibilityDescriptor::current();
        let cancel = CancelFlag::new();

        // A first interrupt finishes the in-flight step and skips the rest;
        // installs already rotated stay in place.
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping after the current step");
                interrupt.cancel();
            }
        });

        let checker = UpdateChecker::new(
            &clients,
            &descriptor,
            config.settings.checksum_pattern.as_deref(),
            &cancel,
        );

        let mut summary = RunSummary::default();
        let mut candidates = Vec::new();
        for app in &apps {
            match checker.check(app).await {
                Ok(CheckOutcome::UpToDate { current }) => summary.push(AppReport {
                    name: app.name.clone(),
                    outcome: AppOutcome::UpToDate {
                        current: current.map(|v| v.to_string()),
                    },
                }),
                Ok(CheckOutcome::Candidate(candidate)) => candidates.push(*candidate),
                Err(e) => summary.push(AppReport {
                    name: app.name.clone(),
                    outcome: super::failed_outcome(e),
                }),
            }
        }

        if self.dry_run {
            for candidate in candidates {
                summary.push(AppReport {
                    name: candidate.app.name.clone(),
                    outcome: AppOutcome::UpdateAvailable {
                        current: candidate.current.map(|v| v.to_string()),
                        latest: candidate.latest.to_string(),
                        asset: candidate.asset.name,
                    },
                });
            }
        } else {
            let orchestrator = DownloadOrchestrator::new(&http, &config.settings, &cancel);
            for (candidate, result) in orchestrator.run(candidates).await {
                let name = candidate.app.name.clone();
                let outcome = match result {
                    Ok(download) => install(&candidate, download)
                        .unwrap_or_else(super::failed_outcome),
                    Err(e) => super::failed_outcome(e),
                };
                summary.push(AppReport { name, outcome });
            }
        }

        // Downloads complete out of order; reports render in config order.
        let order: HashMap<&str, usize> = apps
            .iter()
            .enumerate()
            .map(|(index, app)| (app.name.as_str(), index))
            .collect();
        summary
            .reports
            .sort_by_key(|r| order.get(r.name.as_str()).copied().unwrap_or(usize::MAX));

        super::render_summary(&summary);
        super::finish(&summary)
    }
}

/// Rotate a verified download into place and describe the result.
fn install(candidate: &UpdateCandidate, download: DownloadResult) -> Result<AppOutcome> {
    let app = &candidate.app;
    let base_name = match &app.target_name {
        Some(name) => name.clone(),
        None => default_base_name(&app.name, &download.artifact_name),
    };

    let installed = RotationManager::install(&InstallRequest {
        temp_path: &download.temp,
        target_dir: &app.target_dir,
        base_name: &base_name,
        rotate: app.rotation,
        retain: app.retain,
        symlink: app.symlink.as_deref(),
        sidecar: Some(Sidecar {
            version: candidate.latest.to_string(),
            title: candidate.release_title.clone(),
            installed_at: Utc::now(),
        }),
    })?;
    // The rename moved the file; disarm the temp path's delete-on-drop.
    let _ = download.temp.keep();

    Ok(AppOutcome::Installed {
        version: candidate.latest.to_string(),
        path: installed,
        verification: download.verification,
        bytes: download.bytes,
        elapsed: download.elapsed,
    })
}

/// Installed base filename when no `target_name` is configured: the
/// application name carrying the artifact's extension.
fn default_base_name(app_name: &str, artifact_name: &str) -> String {
    match artifact_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{app_name}.{ext}"),
        _ => app_name.to_string(),
    }
}
