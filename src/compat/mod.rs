//! Platform compatibility filtering for release assets.
//!
//! A release usually carries one asset per platform and often several per
//! Linux distribution. Given the [`CompatibilityDescriptor`] of the running
//! machine, [`select_asset`] narrows the asset list down to the one usable
//! here, refusing to guess when zero or several remain.

use crate::repository::Asset;
use crate::version::VersionToken;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Architecture aliases resolved to a canonical name.
const ARCH_ALIASES: &[(&str, &str)] = &[
    ("x86_64", "x86_64"),
    ("amd64", "x86_64"),
    ("x64", "x86_64"),
    ("aarch64", "aarch64"),
    ("arm64", "aarch64"),
    ("armv7", "armv7"),
    ("armhf", "armv7"),
    ("i686", "i686"),
    ("i386", "i686"),
    ("x86", "i686"),
];

/// Platform aliases resolved to a canonical name.
const PLATFORM_ALIASES: &[(&str, &str)] = &[
    ("linux", "linux"),
    ("windows", "windows"),
    ("win64", "windows"),
    ("win32", "windows"),
    ("macos", "macos"),
    ("darwin", "macos"),
    ("osx", "macos"),
];

/// Linux distribution family tokens recognized in asset filenames.
const DISTRO_FAMILIES: &[&str] = &["ubuntu", "debian", "fedora", "opensuse", "arch", "alpine"];

/// File extensions accepted as installable artifacts.
const INSTALLABLE_EXTENSIONS: &[&str] = &[".appimage", ".zip"];

/// Describes the running machine: canonical CPU architecture, OS platform,
/// and, when relevant, a ranked list of acceptable distribution families.
/// Constructed once per run and read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompatibilityDescriptor {
    /// Canonical architecture name (e.g. `x86_64`).
    pub arch: String,
    /// Canonical platform name (e.g. `linux`).
    pub platform: String,
    /// Distribution family of the host, with its release number when known
    /// (e.g. `("ubuntu", Some("24.04"))`). Empty off Linux.
    pub distro: Option<(String, Option<String>)>,
}

impl CompatibilityDescriptor {
    /// Describe the machine this process is running on.
    pub fn current() -> Self {
        Self {
            arch: canonical_arch(std::env::consts::ARCH).unwrap_or_else(|| std::env::consts::ARCH.to_string()),
            platform: canonical_platform(std::env::consts::OS)
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            distro: detect_distro(),
        }
    }

    /// Build a descriptor from explicit values. Used by tests and by
    /// configuration overrides.
    pub fn new(platform: &str, arch: &str) -> Self {
        Self {
            arch: canonical_arch(arch).unwrap_or_else(|| arch.to_string()),
            platform: canonical_platform(platform).unwrap_or_else(|| platform.to_string()),
            distro: None,
        }
    }

    /// Attach a distribution family and optional release number.
    pub fn with_distro(mut self, family: &str, release: Option<&str>) -> Self {
        self.distro = Some((family.to_string(), release.map(str::to_string)));
        self
    }
}

fn canonical_arch(token: &str) -> Option<String> {
    let lower = token.to_lowercase();
    ARCH_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| (*canonical).to_string())
}

fn canonical_platform(token: &str) -> Option<String> {
    let lower = token.to_lowercase();
    PLATFORM_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| (*canonical).to_string())
}

/// Read `/etc/os-release` for the host's distribution family and version.
fn detect_distro() -> Option<(String, Option<String>)> {
    if std::env::consts::OS != "linux" {
        return None;
    }
    let content = std::fs::read_to_string("/etc/os-release").ok()?;
    let mut id = None;
    let mut version = None;
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("ID=") {
            id = Some(value.trim_matches('"').to_lowercase());
        } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
            version = Some(value.trim_matches('"').to_string());
        }
    }
    id.map(|family| (family, version))
}

/// Why no single asset could be selected for the current machine.
#[derive(Debug, Error)]
pub enum SelectError {
    /// Every asset was filtered out; the release has nothing usable here.
    #[error("no compatible asset for {platform}/{arch} among {names:?}")]
    NoMatch {
        /// Canonical platform that was required.
        platform: String,
        /// Canonical architecture that was required.
        arch: String,
        /// Names of the assets that were considered.
        names: Vec<String>,
    },
    /// Several equally compatible assets remain; the caller must disambiguate.
    #[error("ambiguous asset selection: {names:?}")]
    Ambiguous {
        /// Names of the surviving, tied assets.
        names: Vec<String>,
    },
}

/// Filename classification used while filtering.
#[derive(Debug)]
struct AssetTraits {
    arch: Option<String>,
    platform: Option<String>,
    distro: Option<(String, Option<VersionToken>)>,
    installable: bool,
}

/// Whether `token` occurs in `haystack` delimited by non-alphanumeric
/// characters (or the string edges). `x86` inside `x86_64` does not count
/// because longer aliases are probed first by the callers.
fn contains_token(haystack: &str, token: &str) -> (bool, usize) {
    let mut from = 0;
    while let Some(rel) = haystack[from..].find(token) {
        let start = from + rel;
        let end = start + token.len();
        let before_ok = start == 0
            || !haystack[..start].chars().next_back().is_some_and(char::is_alphanumeric);
        let after_ok =
            end == haystack.len() || !haystack[end..].chars().next().is_some_and(char::is_alphanumeric);
        if before_ok && after_ok {
            return (true, start);
        }
        from = end;
    }
    (false, 0)
}

fn classify(name: &str) -> AssetTraits {
    let lower = name.to_lowercase();
    let mut traits = AssetTraits {
        arch: None,
        platform: None,
        distro: None,
        installable: INSTALLABLE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)),
    };

    // Longest alias first so `x86_64` is found before `x86`.
    let mut arch_aliases: Vec<&(&str, &str)> = ARCH_ALIASES.iter().collect();
    arch_aliases.sort_by_key(|(alias, _)| std::cmp::Reverse(alias.len()));
    for (alias, canonical) in arch_aliases {
        if contains_token(&lower, alias).0 {
            traits.arch = Some((*canonical).to_string());
            break;
        }
    }
    for (alias, canonical) in PLATFORM_ALIASES {
        if contains_token(&lower, alias).0 {
            traits.platform = Some((*canonical).to_string());
            break;
        }
    }
    for family in DISTRO_FAMILIES {
        let (found, _) = contains_token(&lower, family);
        if found {
            traits.distro = Some(((*family).to_string(), None));
            break;
        }
    }
    // A distro token is usually followed by its release number, e.g.
    // "ubuntu-24.04"; pick the first dotted run after the family name.
    if let Some((family, slot @ None)) = traits.distro.as_mut()
        && let Some(idx) = lower.find(family.as_str())
    {
        *slot = crate::version::extract(&lower[idx + family.len()..]);
    }
    traits
}

/// Select the asset usable on `descriptor`'s machine.
///
/// Applies the decision policy in order: drop conflicting platform/arch, drop
/// non-installable formats, prefer the matching distribution family with the
/// closest-equal-or-lower release number, and finally require exactly one
/// survivor. Zero survivors or an unresolvable tie is an error, never a guess.
pub fn select_asset<'a>(
    assets: &'a [Asset],
    descriptor: &CompatibilityDescriptor,
) -> Result<&'a Asset, SelectError> {
    let classified: Vec<(&Asset, AssetTraits)> =
        assets.iter().map(|a| (a, classify(&a.name))).collect();

    let survivors: Vec<&(&Asset, AssetTraits)> = classified
        .iter()
        .filter(|(_, t)| {
            t.installable
                && t.platform.as_deref().is_none_or(|p| p == descriptor.platform)
                && t.arch.as_deref().is_none_or(|a| a == descriptor.arch)
        })
        .collect();

    match survivors.len() {
        0 => Err(SelectError::NoMatch {
            platform: descriptor.platform.clone(),
            arch: descriptor.arch.clone(),
            names: assets.iter().map(|a| a.name.clone()).collect(),
        }),
        1 => Ok(survivors[0].0),
        _ => disambiguate_by_distro(&survivors, descriptor),
    }
}

/// Rule 3: among several compatible assets, prefer the one matching the
/// host's distribution family; among several releases of that family, prefer
/// the closest release number that is equal to or lower than the host's.
fn disambiguate_by_distro<'a>(
    survivors: &[&(&'a Asset, AssetTraits)],
    descriptor: &CompatibilityDescriptor,
) -> Result<&'a Asset, SelectError> {
    if let Some((host_family, host_release)) = &descriptor.distro {
        let family_matches: Vec<&&(&Asset, AssetTraits)> = survivors
            .iter()
            .filter(|(_, t)| t.distro.as_ref().is_some_and(|(f, _)| f == host_family))
            .collect();

        if family_matches.len() == 1 {
            return Ok(family_matches[0].0);
        }
        if family_matches.len() > 1 {
            if let Some(host_release) = host_release {
                let host = VersionToken::parse(host_release);
                let best = family_matches
                    .iter()
                    .filter_map(|(asset, t)| {
                        t.distro.as_ref().and_then(|(_, v)| v.clone()).map(|v| (*asset, v))
                    })
                    .filter(|(_, v)| v.compare(&host) != std::cmp::Ordering::Greater)
                    .max_by(|(_, a), (_, b)| a.compare(b));
                if let Some((asset, _)) = best {
                    return Ok(asset);
                }
            }
            return Err(SelectError::Ambiguous {
                names: family_matches.iter().map(|(a, _)| a.name.clone()).collect(),
            });
        }

        // No asset names our family; assets without any distro token are
        // generic and acceptable.
        let generic: Vec<&&(&Asset, AssetTraits)> =
            survivors.iter().filter(|(_, t)| t.distro.is_none()).collect();
        if generic.len() == 1 {
            return Ok(generic[0].0);
        }
    }

    Err(SelectError::Ambiguous {
        names: survivors.iter().map(|(a, _)| a.name.clone()).collect(),
    })
}
