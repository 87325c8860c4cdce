//! Shared fixtures: a canned-release repository client and config builders.

use anyhow::Result;
use appkeeper::config::{ChecksumPolicy, TrackedApplication};
use appkeeper::core::CancelFlag;
use appkeeper::repository::{Asset, Release, RepoIdentity, RepositoryClient};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::path::Path;

/// Repository client serving a fixed release list for `mock://` URLs.
pub struct MockClient {
    releases: Vec<Release>,
}

impl MockClient {
    pub fn new(releases: Vec<Release>) -> Self {
        Self { releases }
    }

    /// Boxed client list as the checker consumes it.
    pub fn clients(releases: Vec<Release>) -> Vec<Box<dyn RepositoryClient>> {
        vec![Box::new(Self::new(releases))]
    }
}

#[async_trait]
impl RepositoryClient for MockClient {
    fn detect(&self, url: &str) -> bool {
        url.starts_with("mock://")
    }

    async fn resolve(&self, url: &str) -> Result<RepoIdentity> {
        Ok(RepoIdentity {
            id: url.to_string(),
            corrected_url: None,
        })
    }

    async fn list_releases(
        &self,
        _identity: &RepoIdentity,
        include_prerelease: bool,
        cancel: &CancelFlag,
    ) -> Result<Vec<Release>> {
        cancel.check()?;
        Ok(self
            .releases
            .iter()
            .filter(|r| include_prerelease || !r.prerelease)
            .cloned()
            .collect())
    }
}

/// A tracked application pointing at the mock source, rotation enabled.
pub fn tracked_app(name: &str, target_dir: &Path) -> TrackedApplication {
    TrackedApplication {
        name: name.to_string(),
        url: "mock://example/app".to_string(),
        target_dir: target_dir.to_path_buf(),
        pattern: None,
        rotation: true,
        retain: 3,
        symlink: None,
        target_name: None,
        checksum: ChecksumPolicy::default(),
        prerelease: false,
    }
}

/// A release published `day` days after the epoch.
pub fn release(tag: &str, day: i64, prerelease: bool, asset_names: &[&str]) -> Release {
    Release {
        tag: tag.to_string(),
        title: tag.to_string(),
        prerelease,
        published_at: Some(Utc.timestamp_opt(day * 86_400, 0).unwrap()),
        assets: asset_names.iter().map(|name| asset(name)).collect(),
    }
}

pub fn asset(name: &str) -> Asset {
    Asset {
        name: name.to_string(),
        download_url: format!("mock://example/download/{name}"),
        size: 0,
        checksum_asset: None,
    }
}
