//! Repository abstraction: resolve a source URL and list its releases.
//!
//! Each source kind implements the small capability set {detect, resolve,
//! list_releases} behind [`RepositoryClient`]. Clients are tried in order;
//! the first whose `detect` claims the URL wins. The GitHub REST releases API
//! is the reference implementation; [`direct`] handles bare artifact URLs.

pub mod direct;
pub mod github;

use crate::core::{AppkeeperError, CancelFlag};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One published version of a remote project. Immutable once fetched.
#[derive(Debug, Clone)]
pub struct Release {
    /// Tag or identifier (e.g. `v1.2.3`).
    pub tag: String,
    /// Display title of the release.
    pub title: String,
    /// Whether the publisher marked this a prerelease.
    pub prerelease: bool,
    /// Publish timestamp; absent for drafts and synthetic releases.
    pub published_at: Option<DateTime<Utc>>,
    /// Downloadable files attached to this release, in publisher order.
    pub assets: Vec<Asset>,
}

/// One downloadable file attached to a release. Immutable; ownership moves
/// to the download orchestrator once selected.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Filename as published.
    pub name: String,
    /// Direct download URL.
    pub download_url: String,
    /// Size in bytes as reported by the repository.
    pub size: u64,
    /// Companion checksum asset, when one was paired by name matching.
    pub checksum_asset: Option<Box<Asset>>,
}

/// Canonical identity of a repository, as resolved from a source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    /// Canonical identifier (e.g. `owner/repo` for GitHub).
    pub id: String,
    /// Normalized URL when the input needed correction, e.g. a trailing
    /// `/releases` path or `.git` suffix was stripped.
    pub corrected_url: Option<String>,
}

/// Capability set implemented once per source kind.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Whether this implementation claims `url`.
    fn detect(&self, url: &str) -> bool;

    /// Resolve `url` to a canonical repository identity.
    async fn resolve(&self, url: &str) -> Result<RepoIdentity>;

    /// Fetch this repository's releases, newest first as published. When
    /// `include_prerelease` is false, prerelease entries are dropped.
    async fn list_releases(
        &self,
        identity: &RepoIdentity,
        include_prerelease: bool,
        cancel: &CancelFlag,
    ) -> Result<Vec<Release>>;
}

/// Build the default ordered client list. GitHub first, then the
/// direct-download fallback; new source kinds slot in here.
pub fn default_clients(
    http: reqwest::Client,
    max_retries: u32,
) -> Vec<Box<dyn RepositoryClient>> {
    vec![
        Box::new(github::GithubClient::new(http.clone(), max_retries)),
        Box::new(direct::DirectClient::new()),
    ]
}

/// The first client claiming `url`, or an error naming the unsupported URL.
pub fn client_for<'a>(
    clients: &'a [Box<dyn RepositoryClient>],
    url: &str,
) -> Result<&'a dyn RepositoryClient, AppkeeperError> {
    clients
        .iter()
        .find(|c| c.detect(url))
        .map(AsRef::as_ref)
        .ok_or_else(|| AppkeeperError::UnsupportedSource {
            url: url.to_string(),
        })
}
