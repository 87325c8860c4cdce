//! Report available updates without downloading anything.

use crate::checker::{CheckOutcome, UpdateChecker};
use crate::compat::CompatibilityDescriptor;
use crate::config::Config;
use crate::core::CancelFlag;
use crate::report::{AppOutcome, AppReport, RunSummary};
use crate::{net, repository};
use anyhow::Result;
use clap::Args;

/// Arguments for the `check` command.
#[derive(Args)]
pub struct CheckCommand {
    /// Applications to check (all tracked applications when empty).
    names: Vec<String>,
}

impl CheckCommand {
    /// Run one check cycle over the selected applications and render the
    /// per-application outcomes. Nothing on disk changes.
    pub async fn execute(self, config: Config) -> Result<()> {
        let apps = super::select_apps(&config, &self.names)?;
        let http = net::build_client(&config.settings)?;
        let clients = repository::default_clients(http, config.settings.max_retries);
        let descriptor = CompatibilityDescriptor::current();
        let cancel = CancelFlag::new();
        let checker = UpdateChecker::new(
            &clients,
            &descriptor,
            config.settings.checksum_pattern.as_deref(),
            &cancel,
        );

        let mut summary = RunSummary::default();
        for app in &apps {
            let outcome = match checker.check(app).await {
                Ok(CheckOutcome::UpToDate { current }) => AppOutcome::UpToDate {
                    current: current.map(|v| v.to_string()),
                },
                Ok(CheckOutcome::Candidate(candidate)) => AppOutcome::UpdateAvailable {
                    current: candidate.current.map(|v| v.to_string()),
                    latest: candidate.latest.to_string(),
                    asset: candidate.asset.name,
                },
                Err(e) => super::failed_outcome(e),
            };
            summary.push(AppReport {
                name: app.name.clone(),
                outcome,
            });
        }

        super::render_summary(&summary);
        super::finish(&summary)
    }
}
