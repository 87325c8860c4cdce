//! Atomic installation with suffix rotation and symlink management.
//!
//! The on-disk convention for one application is a base file plus suffixed
//! siblings: `app.AppImage.current` is the newest artifact, `.old`, `.old2`,
//! ... are its predecessors up to the retain count, and an optional symlink
//! points at the `.current` file. A sidecar `<current>.info` record captures
//! the installed version and release title for filenames the version engine
//! cannot parse.
//!
//! Every step is an atomic same-filesystem rename ordered from oldest to
//! newest, so the set of existing files at any intermediate point is a
//! superset of what existed before. A failed rename aborts the sequence;
//! completed renames are not rolled back, leaving the directory valid but not
//! fully advanced.

use crate::core::AppkeeperError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix of the newest rotated artifact.
pub const CURRENT_SUFFIX: &str = "current";

/// Advisory sidecar record written next to the installed artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    /// Version extracted at install time.
    pub version: String,
    /// Release title the artifact came from.
    pub title: String,
    /// Install timestamp.
    pub installed_at: DateTime<Utc>,
}

impl Sidecar {
    /// Read the sidecar for an installed file, if present and parsable.
    /// Missing or corrupt sidecars are absent values, never errors.
    pub fn read(installed_file: &Path) -> Option<Self> {
        let path = sidecar_path(installed_file);
        let content = std::fs::read_to_string(path).ok()?;
        toml::from_str(&content).ok()
    }

    fn write(&self, installed_file: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(sidecar_path(installed_file), content)?;
        Ok(())
    }
}

/// `<installed>.info`.
fn sidecar_path(installed_file: &Path) -> PathBuf {
    let mut name = installed_file.file_name().unwrap_or_default().to_os_string();
    name.push(".info");
    installed_file.with_file_name(name)
}

/// Split a rotation suffix off a filename: `app.AppImage.old2` becomes
/// `("app.AppImage", Some("old2"))`.
pub fn split_rotation_suffix(name: &str) -> (&str, Option<&str>) {
    if let Some(base) = name.strip_suffix(".current") {
        return (base, Some("current"));
    }
    if let Some(idx) = name.rfind(".old") {
        let tail = &name[idx + 4..];
        if tail.is_empty() || tail.chars().all(|c| c.is_ascii_digit()) {
            return (&name[..idx], Some(&name[idx + 1..]));
        }
    }
    (name, None)
}

/// Installs verified artifacts into their target directories.
pub struct RotationManager;

/// What to install and how. Consumed once per verified download.
pub struct InstallRequest<'a> {
    /// Verified temporary file, already in the target directory.
    pub temp_path: &'a Path,
    /// Target directory.
    pub target_dir: &'a Path,
    /// Base filename (e.g. `MyApp.AppImage`).
    pub base_name: &'a str,
    /// Whether to keep rotated prior versions.
    pub rotate: bool,
    /// Total artifacts retained when rotating (current + old siblings).
    pub retain: usize,
    /// Optional stable symlink to point at the installed file.
    pub symlink: Option<&'a Path>,
    /// Sidecar metadata to record.
    pub sidecar: Option<Sidecar>,
}

impl RotationManager {
    /// Move a verified temp file into its final position.
    ///
    /// Returns the path of the newly installed artifact. The target
    /// directory never passes through a state with fewer usable artifacts
    /// than before, except for the unavoidable instant of the final rename.
    pub fn install(request: &InstallRequest<'_>) -> Result<PathBuf> {
        let installed = if request.rotate {
            Self::install_rotated(request)?
        } else {
            let final_path = request.target_dir.join(request.base_name);
            rename(request.temp_path, &final_path)?;
            final_path
        };

        if let Some(sidecar) = &request.sidecar {
            // Advisory only; a failed sidecar write does not fail the install.
            if let Err(e) = sidecar.write(&installed) {
                tracing::warn!("could not write sidecar for {}: {e}", installed.display());
            }
        }

        if let Some(link) = request.symlink {
            Self::update_symlink(link, &installed)?;
        }

        tracing::info!("installed {}", installed.display());
        Ok(installed)
    }

    /// Shift suffixes down, oldest first, then move the new file into the
    /// `.current` slot. Replace-renames drop the oldest artifact without any
    /// window where a previously existing file is missing.
    fn install_rotated(request: &InstallRequest<'_>) -> Result<PathBuf> {
        let slot = |suffix: &str| {
            request.target_dir.join(format!("{}.{suffix}", request.base_name))
        };
        let old_slot = |index: usize| {
            if index == 1 {
                slot("old")
            } else {
                slot(&format!("old{index}"))
            }
        };

        let retain = request.retain.max(1);
        for index in (1..retain.saturating_sub(1)).rev() {
            let from = old_slot(index);
            if from.exists() {
                rename(&from, &old_slot(index + 1))?;
            }
        }
        let current = slot(CURRENT_SUFFIX);
        if retain > 1 && current.exists() {
            rename(&current, &old_slot(1))?;
            // The shifted artifact keeps no sidecar; only .current carries one.
            let _ = std::fs::remove_file(sidecar_path(&current));
        }
        rename(request.temp_path, &current)?;
        Ok(current)
    }

    /// Replace `link` atomically: create a temporary symlink next to it, then
    /// rename it over the old path, so the link is never missing or dangling.
    fn update_symlink(link: &Path, target: &Path) -> Result<()> {
        let parent = link.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| AppkeeperError::FileSystem {
            path: parent.display().to_string(),
            reason: e.to_string(),
        })?;
        let staging = parent.join(format!(
            ".{}.tmp-link",
            link.file_name().unwrap_or_default().to_string_lossy()
        ));
        let _ = std::fs::remove_file(&staging);

        #[cfg(unix)]
        std::os::unix::fs::symlink(target, &staging).map_err(|e| AppkeeperError::FileSystem {
            path: staging.display().to_string(),
            reason: e.to_string(),
        })?;
        #[cfg(windows)]
        std::os::windows::fs::symlink_file(target, &staging).map_err(|e| {
            AppkeeperError::FileSystem {
                path: staging.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        rename(&staging, link)?;
        Ok(())
    }
}

fn rename(from: &Path, to: &Path) -> Result<(), AppkeeperError> {
    std::fs::rename(from, to).map_err(|e| AppkeeperError::FileSystem {
        path: to.display().to_string(),
        reason: format!("rename from {} failed: {e}", from.display()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stage(dir: &Path, content: &str) -> PathBuf {
        let temp = dir.join(format!(".stage-{content}"));
        std::fs::write(&temp, content).unwrap();
        temp
    }

    fn install_once(dir: &Path, content: &str, retain: usize) -> PathBuf {
        let temp = stage(dir, content);
        RotationManager::install(&InstallRequest {
            temp_path: &temp,
            target_dir: dir,
            base_name: "app.AppImage",
            rotate: true,
            retain,
            symlink: None,
            sidecar: None,
        })
        .unwrap()
    }

    #[test]
    fn rotation_keeps_exactly_retain_files() {
        let dir = TempDir::new().unwrap();
        for content in ["v1", "v2", "v3"] {
            install_once(dir.path(), content, 3);
        }
        assert_eq!(read(dir.path(), "app.AppImage.current"), "v3");
        assert_eq!(read(dir.path(), "app.AppImage.old"), "v2");
        assert_eq!(read(dir.path(), "app.AppImage.old2"), "v1");
        assert!(!dir.path().join("app.AppImage.old3").exists());

        // Fourth install drops the oldest.
        install_once(dir.path(), "v4", 3);
        assert_eq!(read(dir.path(), "app.AppImage.current"), "v4");
        assert_eq!(read(dir.path(), "app.AppImage.old"), "v3");
        assert_eq!(read(dir.path(), "app.AppImage.old2"), "v2");
        assert!(!dir.path().join("app.AppImage.old3").exists());
    }

    #[test]
    fn retain_one_keeps_only_current() {
        let dir = TempDir::new().unwrap();
        install_once(dir.path(), "v1", 1);
        install_once(dir.path(), "v2", 1);
        assert_eq!(read(dir.path(), "app.AppImage.current"), "v2");
        assert!(!dir.path().join("app.AppImage.old").exists());
    }

    #[test]
    fn disabled_rotation_replaces_base_file() {
        let dir = TempDir::new().unwrap();
        for content in ["v1", "v2"] {
            let temp = stage(dir.path(), content);
            RotationManager::install(&InstallRequest {
                temp_path: &temp,
                target_dir: dir.path(),
                base_name: "app.AppImage",
                rotate: false,
                retain: 0,
                symlink: None,
                sidecar: None,
            })
            .unwrap();
        }
        assert_eq!(read(dir.path(), "app.AppImage"), "v2");
        assert!(!dir.path().join("app.AppImage.current").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_follows_current() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("app");
        for content in ["v1", "v2"] {
            let temp = stage(dir.path(), content);
            RotationManager::install(&InstallRequest {
                temp_path: &temp,
                target_dir: dir.path(),
                base_name: "app.AppImage",
                rotate: true,
                retain: 2,
                symlink: Some(&link),
                sidecar: None,
            })
            .unwrap();
        }
        let resolved = std::fs::read_link(&link).unwrap();
        assert_eq!(resolved, dir.path().join("app.AppImage.current"));
        assert_eq!(std::fs::read_to_string(&link).unwrap(), "v2");
    }

    #[test]
    fn sidecar_written_and_read_back() {
        let dir = TempDir::new().unwrap();
        let temp = stage(dir.path(), "v1");
        let installed = RotationManager::install(&InstallRequest {
            temp_path: &temp,
            target_dir: dir.path(),
            base_name: "app.AppImage",
            rotate: true,
            retain: 3,
            symlink: None,
            sidecar: Some(Sidecar {
                version: "1.0.0".into(),
                title: "Release 1.0.0".into(),
                installed_at: Utc::now(),
            }),
        })
        .unwrap();
        let sidecar = Sidecar::read(&installed).unwrap();
        assert_eq!(sidecar.version, "1.0.0");
        assert_eq!(sidecar.title, "Release 1.0.0");
    }

    #[test]
    fn split_suffix_variants() {
        assert_eq!(
            split_rotation_suffix("app.AppImage.current"),
            ("app.AppImage", Some("current"))
        );
        assert_eq!(split_rotation_suffix("app.AppImage.old"), ("app.AppImage", Some("old")));
        assert_eq!(split_rotation_suffix("app.AppImage.old12"), ("app.AppImage", Some("old12")));
        assert_eq!(split_rotation_suffix("app.AppImage"), ("app.AppImage", None));
        assert_eq!(split_rotation_suffix("golden.zip"), ("golden.zip", None));
    }

    fn read(dir: &Path, name: &str) -> String {
        std::fs::read_to_string(dir.join(name)).unwrap()
    }
}
