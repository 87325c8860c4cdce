//! Configuration loading.
//!
//! The config file is TOML, by default at `~/.config/appkeeper/config.toml`
//! (overridable with `--config` or `APPKEEPER_CONFIG`). It carries the global
//! [`Settings`] and the ordered list of [`TrackedApplication`] records the
//! pipeline consumes. The core never mutates configuration; an unreadable
//! application list is the only run-level fatal condition.
//!
//! ```toml
//! [settings]
//! max_concurrent_downloads = 3
//! max_retries = 3
//!
//! [[applications]]
//! name = "MyApp"
//! url = "https://github.com/example/myapp"
//! target_dir = "~/Applications/myapp"
//! rotation = true
//! retain = 3
//! symlink = "~/bin/myapp"
//!
//! [applications.checksum]
//! enabled = true
//! required = false
//! algorithm = "sha256"
//! ```

use crate::checksum::ChecksumAlgorithm;
use crate::core::AppkeeperError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global settings consumed by the download orchestrator and HTTP clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Total per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum simultaneous downloads.
    pub max_concurrent_downloads: usize,
    /// Retry ceiling for transient network failures.
    pub max_retries: u32,
    /// Default checksum filename pattern (regex) when an application does not
    /// set its own. `{asset}` is replaced by the escaped asset filename.
    pub checksum_pattern: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 300,
            max_concurrent_downloads: 3,
            max_retries: 3,
            checksum_pattern: None,
        }
    }
}

/// Per-application checksum policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksumPolicy {
    /// Whether verification is attempted at all.
    pub enabled: bool,
    /// When true, a missing or failing checksum rejects the candidate;
    /// when false, the file proceeds flagged as unverified.
    pub required: bool,
    /// Digest algorithm.
    pub algorithm: ChecksumAlgorithm,
    /// Filename pattern (regex) locating the companion checksum asset.
    /// Defaults to a pattern derived from the selected asset's filename.
    pub pattern: Option<String>,
}

impl Default for ChecksumPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            required: false,
            algorithm: ChecksumAlgorithm::Sha256,
            pattern: None,
        }
    }
}

/// One tracked application. Read-only configuration record per check cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackedApplication {
    /// Display name; also the default base name for installed files.
    pub name: String,
    /// Source URL (GitHub repository or direct artifact URL).
    pub url: String,
    /// Directory the artifact is installed into.
    pub target_dir: PathBuf,
    /// Explicit filename pattern (regex). Generated from the installed file
    /// when absent.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Whether to keep rotated prior versions.
    #[serde(default = "default_true")]
    pub rotation: bool,
    /// How many artifacts to retain when rotation is enabled (current + old).
    #[serde(default = "default_retain")]
    pub retain: usize,
    /// Optional stable symlink kept pointing at the current artifact.
    #[serde(default)]
    pub symlink: Option<PathBuf>,
    /// Override for the installed base filename. Defaults to the application
    /// name plus the asset's extension.
    #[serde(default)]
    pub target_name: Option<String>,
    /// Checksum policy.
    #[serde(default)]
    pub checksum: ChecksumPolicy,
    /// Whether prerelease entries are eligible.
    #[serde(default)]
    pub prerelease: bool,
}

fn default_true() -> bool {
    true
}

fn default_retain() -> usize {
    3
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,
    /// Ordered list of tracked applications.
    #[serde(default)]
    pub applications: Vec<TrackedApplication>,
}

impl Config {
    /// Default configuration file location.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("APPKEEPER_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let base = dirs::config_dir().context("could not determine config directory")?;
        Ok(base.join("appkeeper").join("config.toml"))
    }

    /// Load the configuration from `path`, expanding `~` in target
    /// directories and symlink paths.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AppkeeperError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| AppkeeperError::Config {
            message: format!("invalid config {}: {e}", path.display()),
        })?;
        for app in &mut config.applications {
            app.target_dir = expand_path(&app.target_dir)?;
            if let Some(link) = &app.symlink {
                app.symlink = Some(expand_path(link)?);
            }
            if app.rotation && app.retain == 0 {
                return Err(AppkeeperError::Config {
                    message: format!("application '{}': retain must be at least 1", app.name),
                }
                .into());
            }
        }
        Ok(config)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let text = path.to_string_lossy();
    let expanded = shellexpand::tilde(&text);
    Ok(PathBuf::from(expanded.as_ref()))
}
