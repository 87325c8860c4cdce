//! Version extraction and comparison for release filenames and titles.
//!
//! Upstream projects encode versions in wildly inconsistent ways: `v1.2.3`
//! tags, `App-2024.01.15-x86_64.AppImage` continuous builds, bare
//! `App-2.0.zip` archives. This module extracts a comparable [`VersionToken`]
//! from any of those forms and defines the ordering the update checker uses
//! to decide whether a remote release is newer than the installed artifact.
//!
//! Extraction is strategy-ordered: a `v`-prefixed dotted run wins over a
//! date-like run, which wins over any bare dotted-numeric run. Trailing commit
//! hashes and platform noise words are stripped first so that
//! `App-1.2.0-a1b2c3d4e-linux.AppImage` yields `1.2.0`, not the hash.
//!
//! Comparison is component-wise numeric when both sides parsed into numeric
//! components, falling back to case-insensitive string comparison otherwise.
//! Extraction failure is an absent value, never an error: callers treat an
//! unknown version as "needs install", not as "oldest".

use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

/// Dotted numeric run with at least two components, e.g. `1.2` or `2024.01.15`.
static DOTTED_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)+").expect("valid regex"));

/// `v`-prefixed dotted run, e.g. `v1.2.3`. The prefix must not follow an
/// alphanumeric character so that `dev1.0` is not misread.
static V_PREFIXED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:^|[^0-9a-z])v(\d+(?:\.\d+)+)").expect("valid regex"));

/// Date-like run: `YYYY.MM.DD` or `YYYY-MM-DD`.
static DATE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})[.-](\d{2})[.-](\d{2})\b").expect("valid regex"));

/// Hex run of 7-40 characters, i.e. a possible commit-hash fragment.
static HEX_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9a-fA-F]{7,40}\b").expect("valid regex"));

/// Tokens that commonly appear in release filenames but never belong to the
/// version itself. Matched case-insensitively between separators.
const NOISE_WORDS: &[&str] = &[
    "release", "build", "stable", "latest", "linux", "windows", "macos", "darwin", "win64",
    "win32", "x86_64", "amd64", "x86", "i686", "i386", "arm64", "aarch64", "armv7", "armhf",
    "universal",
];

/// A comparable version extracted from a filename or release title.
///
/// Holds the raw matched text plus, when the text parsed as a dotted numeric
/// run, its numeric components. Two tokens with numeric components compare
/// component-wise (shorter side padded with zeros); any other pair falls back
/// to case-insensitive comparison of the raw text.
#[derive(Debug, Clone)]
pub struct VersionToken {
    raw: String,
    components: Option<Vec<u64>>,
}

impl VersionToken {
    /// Build a token directly from a raw string, parsing numeric components
    /// when the whole string is a dotted numeric run.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_start_matches(['v', 'V']);
        let components = if DOTTED_RUN
            .find(trimmed)
            .is_some_and(|m| m.start() == 0 && m.end() == trimmed.len())
        {
            Some(trimmed.split('.').filter_map(|c| c.parse().ok()).collect())
        } else {
            None
        };
        Self {
            raw: trimmed.to_string(),
            components,
        }
    }

    /// The raw matched version text, without any `v` prefix.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Compare two tokens. Total, never fails: numeric component-wise when
    /// both sides parsed, case-insensitive lexicographic otherwise.
    pub fn compare(&self, other: &Self) -> Ordering {
        match (&self.components, &other.components) {
            (Some(a), Some(b)) => {
                let len = a.len().max(b.len());
                for i in 0..len {
                    let x = a.get(i).copied().unwrap_or(0);
                    let y = b.get(i).copied().unwrap_or(0);
                    match x.cmp(&y) {
                        Ordering::Equal => {}
                        non_eq => return non_eq,
                    }
                }
                Ordering::Equal
            }
            _ => self.raw.to_lowercase().cmp(&other.raw.to_lowercase()),
        }
    }
}

impl PartialEq for VersionToken {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for VersionToken {}

impl PartialOrd for VersionToken {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for VersionToken {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Strip commit hashes and platform noise words so the extraction strategies
/// only see text that can plausibly contain a version.
fn strip_noise(input: &str) -> String {
    let without_hashes = HEX_HASH.replace_all(input, |caps: &regex::Captures<'_>| {
        let m = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        // Pure-digit runs survive; only runs with hex letters are hashes.
        if m.bytes().any(|b| b.is_ascii_alphabetic()) {
            String::new()
        } else {
            m.to_string()
        }
    });
    let mut cleaned = String::with_capacity(input.len());
    for part in without_hashes.split(['-', '_', ' ']) {
        let lower = part.to_lowercase();
        if NOISE_WORDS.contains(&lower.as_str()) {
            continue;
        }
        if !cleaned.is_empty() {
            cleaned.push('-');
        }
        cleaned.push_str(part);
    }
    cleaned
}

/// Extract a version token from a filename or release title.
///
/// Applies the extraction strategies in priority order and returns the first
/// match, or `None` when nothing in the input looks like a version. Callers
/// must treat `None` as "unknown", never as "oldest".
pub fn extract(input: &str) -> Option<VersionToken> {
    let cleaned = strip_noise(input);

    if let Some(caps) = V_PREFIXED.captures(&cleaned) {
        return Some(VersionToken::parse(&caps[1]));
    }
    if let Some(caps) = DATE_RUN.captures(&cleaned) {
        let normalized = format!("{}.{}.{}", &caps[1], &caps[2], &caps[3]);
        return Some(VersionToken::parse(&normalized));
    }
    if let Some(m) = DOTTED_RUN.find(&cleaned) {
        return Some(VersionToken::parse(m.as_str()));
    }
    None
}

/// Volatile filename tokens replaced by wildcards in generated patterns.
static VOLATILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)v?\d+(?:[.-]\d+)+|[0-9a-f]{7,40}|x86_64|amd64|aarch64|arm64|i686|linux|windows|macos|darwin",
    )
    .expect("valid regex")
});

/// Generate a regex pattern matching the whole family of filenames that
/// differ from `filename` only in their version substring.
///
/// The version run and volatile tokens (arch, OS, dates) are replaced with
/// wildcards, the remaining literal text is escaped, and the pattern accepts
/// an optional rotation suffix (`.current`, `.old`, `.old2`, ...) after the
/// extension. The generated pattern always matches the filename it was
/// generated from.
pub fn generate_pattern(filename: &str) -> String {
    // Split off a known installable extension so a wildcard cannot swallow it.
    let lower = filename.to_lowercase();
    let (stem, ext) = if let Some(idx) = lower.rfind(".appimage") {
        (&filename[..idx], r"\.AppImage")
    } else if let Some(idx) = lower.rfind(".zip") {
        (&filename[..idx], r"\.zip")
    } else {
        (filename, "")
    };

    let mut pattern = String::from("(?i)^");
    let mut last = 0;
    for m in VOLATILE.find_iter(stem) {
        pattern.push_str(&regex::escape(&stem[last..m.start()]));
        pattern.push_str(".*");
        last = m.end();
    }
    pattern.push_str(&regex::escape(&stem[last..]));
    pattern.push_str(ext);
    pattern.push_str(r"(\.(current|old[0-9]*))?$");
    pattern
}
