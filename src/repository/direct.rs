//! Direct-download source: a bare artifact URL with no release listing.
//!
//! Some projects publish a stable download URL instead of tagged releases.
//! This client claims `http(s)` URLs whose path ends in an installable
//! extension and synthesizes a single release whose only asset is the URL
//! itself; the version, when present, comes from the filename.

use super::{Asset, Release, RepoIdentity, RepositoryClient};
use crate::core::CancelFlag;
use anyhow::{Result, bail};
use async_trait::async_trait;

/// Extensions this client claims.
const DIRECT_EXTENSIONS: &[&str] = &[".appimage", ".zip"];

/// Client for bare artifact URLs.
#[derive(Default)]
pub struct DirectClient;

impl DirectClient {
    /// Create the direct-download client.
    pub fn new() -> Self {
        Self
    }

    fn filename(url: &str) -> Option<&str> {
        url.split('?').next()?.rsplit('/').next().filter(|n| !n.is_empty())
    }
}

#[async_trait]
impl RepositoryClient for DirectClient {
    fn detect(&self, url: &str) -> bool {
        let Some(name) = Self::filename(url) else {
            return false;
        };
        (url.starts_with("https://") || url.starts_with("http://"))
            && DIRECT_EXTENSIONS.iter().any(|ext| name.to_lowercase().ends_with(ext))
    }

    async fn resolve(&self, url: &str) -> Result<RepoIdentity> {
        if !self.detect(url) {
            bail!("not a direct artifact URL: {url}");
        }
        Ok(RepoIdentity {
            id: url.to_string(),
            corrected_url: None,
        })
    }

    async fn list_releases(
        &self,
        identity: &RepoIdentity,
        _include_prerelease: bool,
        cancel: &CancelFlag,
    ) -> Result<Vec<Release>> {
        cancel.check()?;
        let name = Self::filename(&identity.id).unwrap_or("artifact").to_string();
        let title = crate::version::extract(&name)
            .map_or_else(|| name.clone(), |v| v.to_string());
        Ok(vec![Release {
            tag: title.clone(),
            title,
            prerelease: false,
            published_at: None,
            assets: vec![Asset {
                name,
                download_url: identity.id.clone(),
                size: 0,
                checksum_asset: None,
            }],
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_installable_urls_only() {
        let c = DirectClient::new();
        assert!(c.detect("https://example.com/dl/App-1.2.0.AppImage"));
        assert!(c.detect("https://example.com/dl/app.zip?mirror=1"));
        assert!(!c.detect("https://example.com/dl/app.tar.gz"));
        assert!(!c.detect("ftp://example.com/app.AppImage"));
    }

    #[tokio::test]
    async fn synthesizes_single_release() {
        let c = DirectClient::new();
        let identity = c.resolve("https://example.com/dl/App-1.2.0.AppImage").await.unwrap();
        let releases = c.list_releases(&identity, false, &CancelFlag::new()).await.unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].title, "1.2.0");
        assert_eq!(releases[0].assets[0].name, "App-1.2.0.AppImage");
        assert_eq!(releases[0].assets[0].download_url, identity.id);
    }
}
