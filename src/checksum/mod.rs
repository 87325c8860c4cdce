//! Checksum verification for downloaded artifacts.
//!
//! Releases commonly ship a companion checksum file (`SHA256SUMS`,
//! `app.AppImage.sha256`, ...) next to the artifact. This module parses those
//! files, computes local digests, and reports whether a downloaded file
//! matches. Parsing is deliberately tolerant: a bare hex digest on its own
//! line, `digest  filename` pairs, extra whitespace, and mixed-case hex are
//! all accepted.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Supported digest algorithms for checksum policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// SHA-256, the overwhelming default for release checksum files.
    #[default]
    Sha256,
    /// SHA-512, occasionally used by larger projects.
    Sha512,
}

impl ChecksumAlgorithm {
    /// Expected hex digest length for this algorithm.
    fn hex_len(self) -> usize {
        match self {
            Self::Sha256 => 64,
            Self::Sha512 => 128,
        }
    }
}

/// Terminal verification status recorded on a download result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// Digest matched the checksum file.
    Verified,
    /// Digest did not match the checksum file.
    Failed,
    /// A checksum was expected but could not be obtained or parsed.
    Skipped,
    /// The application's policy does not ask for verification.
    NotRequired,
}

/// Computes digests and checks them against companion checksum files.
pub struct ChecksumVerifier;

impl ChecksumVerifier {
    /// Compute the hex digest of a file, streaming so large artifacts do not
    /// need to fit in memory.
    pub async fn compute(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String> {
        let mut file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("failed to open {} for hashing", path.display()))?;
        let mut buf = vec![0u8; 64 * 1024];

        match algorithm {
            ChecksumAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let n = file.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                Ok(hex::encode(hasher.finalize()))
            }
            ChecksumAlgorithm::Sha512 => {
                let mut hasher = Sha512::new();
                loop {
                    let n = file.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                Ok(hex::encode(hasher.finalize()))
            }
        }
    }

    /// Extract the expected digest for `filename` from checksum file content.
    ///
    /// Accepts a bare digest on its own line, or `digest  filename` pairs
    /// matched by filename suffix (checksum files sometimes carry `./` or
    /// directory prefixes). Returns `None` when no line applies.
    pub fn parse_expected(
        content: &str,
        filename: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Option<String> {
        let mut bare: Option<String> = None;
        for line in content.lines() {
            let mut fields = line.split_whitespace();
            let Some(first) = fields.next() else { continue };
            if !is_hex_digest(first, algorithm) {
                continue;
            }
            match fields.next() {
                None => {
                    // Bare digest line. Only trustworthy when the file has a
                    // single digest; remember the first one.
                    bare.get_or_insert_with(|| first.to_lowercase());
                }
                Some(entry) => {
                    // BSD-style `*filename` markers and path prefixes are common.
                    let entry = entry.trim_start_matches('*');
                    if entry == filename || entry.ends_with(&format!("/{filename}")) {
                        return Some(first.to_lowercase());
                    }
                }
            }
        }
        bare
    }

    /// Verify a local file against checksum file content.
    ///
    /// Errors only on I/O problems; a digest mismatch or an unparsable
    /// checksum file is reported through [`VerifyStatus`] so the caller can
    /// apply its policy.
    pub async fn verify(
        path: &Path,
        filename: &str,
        checksum_content: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Result<VerifyStatus> {
        let Some(expected) = Self::parse_expected(checksum_content, filename, algorithm) else {
            tracing::warn!("no digest for {filename} in checksum file");
            return Ok(VerifyStatus::Skipped);
        };
        let actual = Self::compute(path, algorithm).await?;
        if actual.eq_ignore_ascii_case(&expected) {
            tracing::debug!("checksum verified for {filename}");
            Ok(VerifyStatus::Verified)
        } else {
            tracing::warn!("checksum mismatch for {filename}: expected {expected}, got {actual}");
            Ok(VerifyStatus::Failed)
        }
    }

    /// Like [`verify`](Self::verify), but failing verification is an error.
    /// Used when the application's checksum policy is `required`.
    pub async fn verify_required(
        path: &Path,
        filename: &str,
        checksum_content: &str,
        algorithm: ChecksumAlgorithm,
    ) -> Result<()> {
        match Self::verify(path, filename, checksum_content, algorithm).await? {
            VerifyStatus::Verified => Ok(()),
            VerifyStatus::Failed => bail!("checksum mismatch for {filename}"),
            VerifyStatus::Skipped | VerifyStatus::NotRequired => {
                bail!("checksum required but no digest found for {filename}")
            }
        }
    }
}

fn is_hex_digest(s: &str, algorithm: ChecksumAlgorithm) -> bool {
    s.len() == algorithm.hex_len() && s.bytes().all(|b| b.is_ascii_hexdigit())
}
