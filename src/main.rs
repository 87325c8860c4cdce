//! appkeeper CLI entry point.
//!
//! Parses command-line arguments, dispatches to the subcommand, and renders
//! failures with remediation hints before exiting nonzero.

use anyhow::Result;
use appkeeper::cli;
use appkeeper::core::error::user_friendly_error;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
