//! Update checking: decide, per tracked application, whether a newer release
//! exists and which asset to fetch.
//!
//! Each cycle runs the same sequence for one application: scan the target
//! directory for the installed version, fetch releases through the detected
//! repository client, select the compatible asset, compare versions, and pair
//! a checksum asset per policy. Failures are scoped to the application; the
//! caller continues with the rest of the run.

use crate::compat::{self, CompatibilityDescriptor};
use crate::config::TrackedApplication;
use crate::core::{AppkeeperError, CancelFlag};
use crate::repository::{Asset, Release, RepositoryClient, client_for};
use crate::rotation::{Sidecar, split_rotation_suffix};
use crate::version::{self, VersionToken};
use anyhow::Result;
use regex::Regex;
use std::cmp::Ordering;
use std::path::PathBuf;

/// An application determined to need an update, paired with the asset chosen
/// for download. Consumed exactly once by the download orchestrator.
#[derive(Debug)]
pub struct UpdateCandidate {
    /// The tracked application this candidate belongs to.
    pub app: TrackedApplication,
    /// Currently installed version, when one was detected.
    pub current: Option<VersionToken>,
    /// Version of the selected release.
    pub latest: VersionToken,
    /// Title of the selected release, recorded in the sidecar.
    pub release_title: String,
    /// The asset to download.
    pub asset: Asset,
    /// Companion checksum asset, when the policy asked for one and a sibling
    /// matched.
    pub checksum_asset: Option<Asset>,
}

/// Result of one application's check.
#[derive(Debug)]
pub enum CheckOutcome {
    /// Installed artifact is current (or newer than the latest release).
    UpToDate {
        /// The detected installed version.
        current: Option<VersionToken>,
    },
    /// An update is available.
    Candidate(Box<UpdateCandidate>),
}

/// Orchestrates repository clients, the version engine, and the
/// compatibility filter. Constructed once per run and shared.
pub struct UpdateChecker<'a> {
    clients: &'a [Box<dyn RepositoryClient>],
    descriptor: &'a CompatibilityDescriptor,
    default_checksum_pattern: Option<&'a str>,
    cancel: &'a CancelFlag,
}

impl<'a> UpdateChecker<'a> {
    /// Wire up a checker from run-wide collaborators.
    pub fn new(
        clients: &'a [Box<dyn RepositoryClient>],
        descriptor: &'a CompatibilityDescriptor,
        default_checksum_pattern: Option<&'a str>,
        cancel: &'a CancelFlag,
    ) -> Self {
        Self {
            clients,
            descriptor,
            default_checksum_pattern,
            cancel,
        }
    }

    /// Run one check cycle for `app`.
    pub async fn check(&self, app: &TrackedApplication) -> Result<CheckOutcome> {
        self.cancel.check()?;
        let current = scan_installed(app)?;
        tracing::debug!(
            "{}: installed version {}",
            app.name,
            current.as_ref().map_or_else(|| "unknown".to_string(), ToString::to_string)
        );

        let client = client_for(self.clients, &app.url)?;
        let identity = client.resolve(&app.url).await?;
        if let Some(corrected) = &identity.corrected_url {
            tracing::debug!("{}: source url normalized to {corrected}", app.name);
        }
        let releases = client.list_releases(&identity, app.prerelease, self.cancel).await?;
        let release = newest_release(releases).ok_or_else(|| AppkeeperError::Compatibility {
            app: app.name.clone(),
            reason: "repository has no (matching) releases".to_string(),
        })?;

        let asset = compat::select_asset(&release.assets, self.descriptor)
            .map_err(|e| AppkeeperError::Compatibility {
                app: app.name.clone(),
                reason: e.to_string(),
            })?
            .clone();

        let latest = latest_version(&release, &asset);
        let update_needed = match &current {
            None => true,
            Some(current) => current.compare(&latest) == Ordering::Less,
        };
        if !update_needed {
            return Ok(CheckOutcome::UpToDate { current });
        }

        let checksum_asset = self.pair_checksum(app, &release, &asset)?;

        Ok(CheckOutcome::Candidate(Box::new(UpdateCandidate {
            current,
            latest,
            release_title: release.title,
            asset,
            checksum_asset,
            app: app.clone(),
        })))
    }

    /// Find the sibling checksum asset matching the application's policy.
    /// `None` with a `required` policy is an error; downloading unverified
    /// silently is never acceptable there.
    fn pair_checksum(
        &self,
        app: &TrackedApplication,
        release: &Release,
        asset: &Asset,
    ) -> Result<Option<Asset>> {
        if !app.checksum.enabled {
            return Ok(None);
        }

        let pattern = app
            .checksum
            .pattern
            .as_deref()
            .or(self.default_checksum_pattern)
            .map_or_else(default_checksum_pattern, str::to_string)
            .replace("{asset}", &regex::escape(&asset.name));
        let re = Regex::new(&pattern).map_err(|e| AppkeeperError::Config {
            message: format!("application '{}': invalid checksum pattern: {e}", app.name),
        })?;

        let paired = release
            .assets
            .iter()
            .find(|a| a.name != asset.name && re.is_match(&a.name))
            .cloned();

        if paired.is_none() && app.checksum.required {
            return Err(AppkeeperError::ChecksumUnavailable {
                app: app.name.clone(),
            }
            .into());
        }
        Ok(paired)
    }
}

/// Scan the target directory for the installed version: the highest token
/// among base and `.current` files matching the application's pattern, with
/// the sidecar consulted before filename extraction. Rotated `.old*` siblings
/// are ignored. A missing target directory means nothing is installed.
///
/// When no explicit pattern is configured, one is generated from the
/// installed artifact itself (see [`anchor_pattern`]), so unrelated files
/// that merely share a name prefix never count as installed versions.
pub fn scan_installed(app: &TrackedApplication) -> Result<Option<VersionToken>> {
    let explicit = match &app.pattern {
        Some(p) => Some(Regex::new(p).map_err(|e| AppkeeperError::Config {
            message: format!("application '{}': invalid pattern: {e}", app.name),
        })?),
        None => None,
    };

    let entries = match std::fs::read_dir(&app.target_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(AppkeeperError::FileSystem {
                path: app.target_dir.display().to_string(),
                reason: e.to_string(),
            }
            .into());
        }
    };

    // Only the base file and the .current slot define the installed version;
    // .old* siblings are prior versions and .info files are sidecar metadata.
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".info") {
            continue;
        }
        let (_, suffix) = split_rotation_suffix(&name);
        if matches!(suffix, None | Some("current")) {
            files.push((name, entry.path()));
        }
    }
    files.sort();

    let matcher = match explicit {
        Some(re) => Some(re),
        None => anchor_pattern(&files, app)?,
    };
    let Some(matcher) = matcher else {
        return Ok(None);
    };

    let mut best: Option<VersionToken> = None;
    for (name, path) in &files {
        // Match against the suffix-stripped stem so explicit patterns need
        // not anticipate rotation suffixes.
        let (stem, _) = split_rotation_suffix(name);
        if !matcher.is_match(stem) {
            continue;
        }
        let token = Sidecar::read(path)
            .map(|s| VersionToken::parse(&s.version))
            .or_else(|| version::extract(stem));
        if let Some(token) = token
            && best.as_ref().is_none_or(|b| token.compare(b) == Ordering::Greater)
        {
            best = Some(token);
        }
    }
    Ok(best)
}

/// Derive the filename matcher for an application without an explicit
/// pattern: find the installed artifact by base-name ownership (`.current`
/// slot preferred), then generate the family pattern from its filename. No
/// owned artifact means nothing is installed.
fn anchor_pattern(
    files: &[(String, PathBuf)],
    app: &TrackedApplication,
) -> Result<Option<Regex>> {
    let anchor = files
        .iter()
        .filter_map(|(name, _)| {
            let (stem, suffix) = split_rotation_suffix(name);
            file_belongs_to(stem, app).then_some((stem, suffix))
        })
        .max_by_key(|(_, suffix)| *suffix == Some("current"));
    let Some((stem, _)) = anchor else {
        return Ok(None);
    };

    let pattern = version::generate_pattern(stem);
    let re = Regex::new(&pattern).map_err(|e| AppkeeperError::Config {
        message: format!("application '{}': generated pattern is invalid: {e}", app.name),
    })?;
    Ok(Some(re))
}

/// Whether a directory entry (rotation suffix already stripped) belongs to
/// this application: the configured target name, or the application name
/// followed by nothing or a separator. A longer word sharing the name as a
/// prefix (`appfoo` for `app`) does not qualify.
fn file_belongs_to(stem: &str, app: &TrackedApplication) -> bool {
    if let Some(target) = &app.target_name {
        return stem.eq_ignore_ascii_case(target);
    }
    match stem.to_lowercase().strip_prefix(&app.name.to_lowercase()) {
        Some(rest) => !rest.chars().next().is_some_and(char::is_alphanumeric),
        None => false,
    }
}

/// Newest release by publish timestamp. Titles are not guaranteed to order
/// monotonically, so the timestamp decides; releases without one (drafts,
/// synthetic direct-download releases) lose to any dated release.
fn newest_release(releases: Vec<Release>) -> Option<Release> {
    releases.into_iter().max_by_key(|r| r.published_at)
}

/// Version of the selected release: the asset filename is most specific,
/// then the release title, then the tag; an unparsable tag still yields a
/// string-comparable token.
fn latest_version(release: &Release, asset: &Asset) -> VersionToken {
    version::extract(&asset.name)
        .or_else(|| version::extract(&release.title))
        .or_else(|| version::extract(&release.tag))
        .unwrap_or_else(|| VersionToken::parse(&release.tag))
}

/// Default checksum filename pattern: `<asset>.sha256`-style companions or a
/// release-wide sums file. `{asset}` is replaced with the escaped asset name
/// before compilation.
fn default_checksum_pattern() -> String {
    r"(?i)^(?:{asset}\.(?:sha256|sha512|digest|sum)|sha-?256sums(?:\.txt)?|checksums?\.txt)$"
        .to_string()
}
