//! Show tracked applications and their installed versions.

use crate::checker;
use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;

/// Arguments for the `list` command.
#[derive(Args)]
pub struct ListCommand {}

impl ListCommand {
    /// Print one line per tracked application: name, installed version (from
    /// the local scan only, no network), source URL, and target directory.
    pub fn execute(self, config: &Config) -> Result<()> {
        if config.applications.is_empty() {
            println!("no tracked applications configured");
            return Ok(());
        }
        for app in &config.applications {
            let version = match checker::scan_installed(app) {
                Ok(Some(token)) => token.to_string().green().to_string(),
                Ok(None) => "not installed".dimmed().to_string(),
                Err(e) => format!("{}", format!("unreadable: {e:#}").red()),
            };
            println!(
                "  {}  {version}  {}  {}",
                app.name.bold(),
                app.url.dimmed(),
                app.target_dir.display()
            );
        }
        Ok(())
    }
}
