//! GitHub releases client.
//!
//! Talks to the REST releases API (`/repos/{owner}/{repo}/releases`) and maps
//! the JSON into [`Release`]/[`Asset`] records. A `GITHUB_TOKEN` environment
//! variable, when present, is attached as a bearer token to stay clear of the
//! unauthenticated rate limit.

use super::{Release, RepoIdentity, RepositoryClient};
use crate::core::CancelFlag;
use crate::net;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// Releases fetched per listing call; enough to find the newest stable entry
/// even on repositories that publish frequent prereleases.
const RELEASES_PER_PAGE: u32 = 30;

/// `github.com/{owner}/{repo}` with optional scheme, `.git`, and trailing path.
static GITHUB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://)?(?:www\.)?github\.com/([^/\s]+)/([^/\s]+?)(?:\.git)?(?:/.*)?$")
        .expect("valid regex")
});

/// GitHub REST releases client.
pub struct GithubClient {
    http: reqwest::Client,
    max_retries: u32,
    api_base: String,
}

impl GithubClient {
    /// Create a client sharing the run-wide HTTP client.
    pub fn new(http: reqwest::Client, max_retries: u32) -> Self {
        Self {
            http,
            max_retries,
            api_base: "https://api.github.com".to_string(),
        }
    }

    fn token() -> Option<String> {
        std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiRelease {
    tag_name: String,
    name: Option<String>,
    prerelease: bool,
    draft: bool,
    published_at: Option<DateTime<Utc>>,
    assets: Vec<ApiAsset>,
}

#[derive(Debug, Deserialize)]
struct ApiAsset {
    name: String,
    browser_download_url: String,
    size: u64,
}

#[async_trait]
impl RepositoryClient for GithubClient {
    fn detect(&self, url: &str) -> bool {
        GITHUB_URL.is_match(url)
    }

    async fn resolve(&self, url: &str) -> Result<RepoIdentity> {
        let Some(caps) = GITHUB_URL.captures(url) else {
            bail!("not a GitHub repository URL: {url}");
        };
        let owner = &caps[1];
        let repo = &caps[2];
        let canonical = format!("https://github.com/{owner}/{repo}");
        Ok(RepoIdentity {
            id: format!("{owner}/{repo}"),
            corrected_url: (url != canonical).then_some(canonical),
        })
    }

    async fn list_releases(
        &self,
        identity: &RepoIdentity,
        include_prerelease: bool,
        cancel: &CancelFlag,
    ) -> Result<Vec<Release>> {
        let url = format!(
            "{}/repos/{}/releases?per_page={RELEASES_PER_PAGE}",
            self.api_base, identity.id
        );
        tracing::debug!("listing releases for {}", identity.id);

        let token = Self::token();
        let response =
            net::get_retrying(&self.http, &url, token.as_deref(), self.max_retries, cancel).await?;
        let api_releases: Vec<ApiRelease> = response
            .json()
            .await
            .with_context(|| format!("malformed releases response for {}", identity.id))?;

        let releases = api_releases
            .into_iter()
            .filter(|r| !r.draft && (include_prerelease || !r.prerelease))
            .map(|r| Release {
                title: r.name.filter(|n| !n.is_empty()).unwrap_or_else(|| r.tag_name.clone()),
                tag: r.tag_name,
                prerelease: r.prerelease,
                published_at: r.published_at,
                assets: r
                    .assets
                    .into_iter()
                    .map(|a| super::Asset {
                        name: a.name,
                        download_url: a.browser_download_url,
                        size: a.size,
                        checksum_asset: None,
                    })
                    .collect(),
            })
            .collect();
        Ok(releases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GithubClient {
        GithubClient::new(reqwest::Client::new(), 1)
    }

    #[test]
    fn detects_github_urls() {
        let c = client();
        assert!(c.detect("https://github.com/owner/repo"));
        assert!(c.detect("github.com/owner/repo.git"));
        assert!(c.detect("https://github.com/owner/repo/releases/tag/v1.0"));
        assert!(!c.detect("https://gitlab.com/owner/repo"));
        assert!(!c.detect("https://example.com/app.AppImage"));
    }

    #[tokio::test]
    async fn resolves_canonical_identity() {
        let c = client();
        let identity = c.resolve("https://github.com/owner/repo").await.unwrap();
        assert_eq!(identity.id, "owner/repo");
        assert_eq!(identity.corrected_url, None);
    }

    #[tokio::test]
    async fn corrects_noncanonical_urls() {
        let c = client();
        let identity =
            c.resolve("https://github.com/owner/repo.git/releases/latest").await.unwrap();
        assert_eq!(identity.id, "owner/repo");
        assert_eq!(
            identity.corrected_url.as_deref(),
            Some("https://github.com/owner/repo")
        );
    }

    #[test]
    fn parses_release_json() {
        let json = r#"[{
            "tag_name": "v1.2.0",
            "name": "Release 1.2.0",
            "prerelease": false,
            "draft": false,
            "published_at": "2024-03-01T12:00:00Z",
            "assets": [
                {"name": "app-linux-x86_64.AppImage",
                 "browser_download_url": "https://github.com/owner/repo/releases/download/v1.2.0/app-linux-x86_64.AppImage",
                 "size": 12345}
            ]
        }]"#;
        let releases: Vec<ApiRelease> = serde_json::from_str(json).unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].tag_name, "v1.2.0");
        assert_eq!(releases[0].assets[0].size, 12345);
    }
}
