//! Concurrent artifact downloads with verification and archive extraction.
//!
//! Candidates fan out over a bounded [`futures::StreamExt::buffer_unordered`]
//! pool sized by `max_concurrent_downloads`. Each download streams into a
//! temporary file inside the application's target directory, so the later
//! install rename never crosses a filesystem boundary. Verification runs
//! against the downloaded asset before any extraction; zip assets then have
//! their first installable entry extracted in a blocking task. A failed
//! candidate drops its temp file and never reaches the rotation step.

use crate::checker::UpdateCandidate;
use crate::checksum::{ChecksumVerifier, VerifyStatus};
use crate::config::Settings;
use crate::core::{AppkeeperError, CancelFlag};
use crate::net;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::AsyncWriteExt;

/// A downloaded, policy-verified artifact ready for installation.
pub struct DownloadResult {
    /// Temporary file in the target directory; deleted on drop unless the
    /// rotation step renames it away first.
    pub temp: TempPath,
    /// Filename of the installable artifact: the asset name, or the extracted
    /// entry's name for archives.
    pub artifact_name: String,
    /// Verification outcome recorded in the run report.
    pub verification: VerifyStatus,
    /// Bytes transferred for the asset itself.
    pub bytes: u64,
    /// Wall-clock time for the whole fetch, verify, extract sequence.
    pub elapsed: Duration,
}

/// Runs the download stage for all candidates of one cycle.
pub struct DownloadOrchestrator<'a> {
    client: &'a reqwest::Client,
    settings: &'a Settings,
    cancel: &'a CancelFlag,
}

impl<'a> DownloadOrchestrator<'a> {
    /// Wire up the orchestrator with the run-wide HTTP client and settings.
    pub fn new(client: &'a reqwest::Client, settings: &'a Settings, cancel: &'a CancelFlag) -> Self {
        Self {
            client,
            settings,
            cancel,
        }
    }

    /// Download every candidate with bounded concurrency. Each candidate's
    /// outcome is independent; one failure never aborts the others.
    pub async fn run(
        &self,
        candidates: Vec<UpdateCandidate>,
    ) -> Vec<(UpdateCandidate, Result<DownloadResult>)> {
        futures::stream::iter(candidates.into_iter().map(|candidate| async move {
            let result = self.fetch(&candidate).await;
            if let Err(e) = &result {
                tracing::warn!("{}: download failed: {e:#}", candidate.app.name);
            }
            (candidate, result)
        }))
        .buffer_unordered(self.settings.max_concurrent_downloads.max(1))
        .collect()
        .await
    }

    async fn fetch(&self, candidate: &UpdateCandidate) -> Result<DownloadResult> {
        let app = &candidate.app;
        let start = Instant::now();

        tokio::fs::create_dir_all(&app.target_dir)
            .await
            .map_err(|e| AppkeeperError::FileSystem {
                path: app.target_dir.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            "{}: downloading {} ({})",
            app.name,
            candidate.asset.name,
            candidate.latest
        );
        let (temp, bytes) = self
            .download_to_temp(&candidate.asset.download_url, &app.target_dir)
            .await?;

        // Verify the asset as published, before extraction changes the bytes.
        let verification = self.verify(candidate, &temp).await?;

        let (temp, artifact_name) = if is_archive(&candidate.asset.name) {
            self.extract_archive(temp, &candidate.asset.name, &app.target_dir)
                .await?
        } else {
            (temp, candidate.asset.name.clone())
        };

        if artifact_name.to_lowercase().ends_with(".appimage") {
            make_executable(&temp)?;
        }

        Ok(DownloadResult {
            temp,
            artifact_name,
            verification,
            bytes,
            elapsed: start.elapsed(),
        })
    }

    /// Stream a GET response into a temp file in `dir`.
    async fn download_to_temp(&self, url: &str, dir: &Path) -> Result<(TempPath, u64)> {
        let response = net::get_retrying(
            self.client,
            url,
            None,
            self.settings.max_retries,
            self.cancel,
        )
        .await?;

        let temp = NamedTempFile::new_in(dir).map_err(|e| AppkeeperError::FileSystem {
            path: dir.display().to_string(),
            reason: format!("cannot create temporary file: {e}"),
        })?;
        let mut file = tokio::fs::File::from_std(temp.as_file().try_clone()?);

        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            self.cancel.check()?;
            let chunk = chunk.map_err(|e| AppkeeperError::NetworkTransient {
                url: url.to_string(),
                attempts: 1,
                reason: format!("transfer interrupted: {e}"),
            })?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        tracing::debug!("fetched {bytes} bytes from {url}");
        Ok((temp.into_temp_path(), bytes))
    }

    /// Apply the application's checksum policy to the downloaded file.
    ///
    /// A digest mismatch is always fatal for the candidate. A missing or
    /// unusable checksum is fatal only under a `required` policy; otherwise
    /// the artifact proceeds flagged as unverified.
    async fn verify(&self, candidate: &UpdateCandidate, path: &Path) -> Result<VerifyStatus> {
        let app = &candidate.app;
        if !app.checksum.enabled {
            return Ok(VerifyStatus::NotRequired);
        }
        let Some(checksum_asset) = &candidate.checksum_asset else {
            // A required policy without a paired asset was rejected at check
            // time; reaching here means unverified is acceptable.
            return Ok(VerifyStatus::Skipped);
        };

        let content = match net::get_retrying(
            self.client,
            &checksum_asset.download_url,
            None,
            self.settings.max_retries,
            self.cancel,
        )
        .await
        {
            Ok(response) => response
                .text()
                .await
                .with_context(|| format!("reading checksum file {}", checksum_asset.name))?,
            Err(AppkeeperError::Cancelled) => return Err(AppkeeperError::Cancelled.into()),
            Err(e) if app.checksum.required => return Err(e.into()),
            Err(e) => {
                tracing::warn!(
                    "{}: checksum file {} unavailable ({e}), proceeding unverified",
                    app.name,
                    checksum_asset.name
                );
                return Ok(VerifyStatus::Skipped);
            }
        };

        let status = ChecksumVerifier::verify(
            path,
            &candidate.asset.name,
            &content,
            app.checksum.algorithm,
        )
        .await?;
        match status {
            VerifyStatus::Failed => Err(AppkeeperError::ChecksumMismatch {
                file: candidate.asset.name.clone(),
            }
            .into()),
            VerifyStatus::Skipped if app.checksum.required => {
                Err(AppkeeperError::ChecksumUnavailable {
                    app: app.name.clone(),
                }
                .into())
            }
            other => Ok(other),
        }
    }

    /// Extract the first installable entry of a zip asset into its own temp
    /// file. The archive temp file is dropped (deleted) afterwards.
    async fn extract_archive(
        &self,
        archive: TempPath,
        archive_name: &str,
        dir: &Path,
    ) -> Result<(TempPath, String)> {
        let name = archive_name.to_string();
        let dir = dir.to_path_buf();
        tokio::task::spawn_blocking(move || extract_blocking(&archive, &name, &dir))
            .await
            .context("archive extraction task failed")?
    }
}

fn is_archive(name: &str) -> bool {
    name.to_lowercase().ends_with(".zip")
}

/// Entries the extractor considers installable inside an archive. Nested
/// archives are not.
const EXTRACTABLE_EXTENSIONS: &[&str] = &[".appimage"];

fn extract_blocking(archive_path: &Path, archive_name: &str, dir: &Path) -> Result<(TempPath, String)> {
    let file = std::fs::File::open(archive_path)?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("cannot read archive {archive_name}"))?;

    let mut selected = None;
    for index in 0..zip.len() {
        let entry = zip.by_index(index)?;
        let lower = entry.name().to_lowercase();
        if entry.is_file() && EXTRACTABLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            selected = Some(index);
            break;
        }
    }
    let Some(index) = selected else {
        return Err(AppkeeperError::EmptyArchive {
            archive: archive_name.to_string(),
        }
        .into());
    };

    let mut entry = zip.by_index(index)?;
    let entry_name = Path::new(entry.name())
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| archive_name.to_string());
    let mut out = NamedTempFile::new_in(dir).map_err(|e| AppkeeperError::FileSystem {
        path: dir.display().to_string(),
        reason: format!("cannot create temporary file: {e}"),
    })?;
    std::io::copy(&mut entry, &mut out)
        .with_context(|| format!("extracting {entry_name} from {archive_name}"))?;
    tracing::debug!("extracted {entry_name} from {archive_name}");
    Ok((out.into_temp_path(), entry_name))
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
        AppkeeperError::FileSystem {
            path: path.display().to_string(),
            reason: format!("cannot mark executable: {e}"),
        }
    })?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
