//! Strict semantic-version tags (`v1.2.3` or `1.2.3`) and highest-tag selection.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static SEMVER_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)$").ok());

/// A tag whose name is exactly a version triple, optionally prefixed with `v`.
///
/// Ordering compares the integer triple only; `v1.2.3` and `1.2.3` are equal
/// in rank, but the original tag text is kept for creating releases.
#[derive(Debug, Clone)]
pub struct SemverTag {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub tag: String,
}

impl SemverTag {
    /// `None` for pre-releases, build metadata, or anything else non-strict.
    pub fn parse(tag: &str) -> Option<Self> {
        let captures = SEMVER_TAG.as_ref()?.captures(tag)?;
        let part = |i: usize| captures.get(i)?.as_str().parse::<u64>().ok();
        Some(Self {
            major: part(1)?,
            minor: part(2)?,
            patch: part(3)?,
            tag: tag.to_string(),
        })
    }

    pub fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// `X.Y.Z` without any `v` prefix.
    pub fn version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl PartialEq for SemverTag {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for SemverTag {}

impl PartialOrd for SemverTag {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemverTag {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.triple().cmp(&other.triple())
    }
}

impl fmt::Display for SemverTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)
    }
}

/// Highest strict semver tag among `tags`; non-matching names are ignored.
///
/// When two tags share a triple (`1.0.0` and `v1.0.0`) the last listed wins.
pub fn latest_semver_tag<I, S>(tags: I) -> Option<SemverTag>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut best: Option<SemverTag> = None;
    for candidate in tags.into_iter().filter_map(|t| SemverTag::parse(t.as_ref())) {
        if best.as_ref().is_none_or(|b| candidate >= *b) {
            best = Some(candidate);
        }
    }
    best
}
