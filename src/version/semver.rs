//! Semantic version parsing and ordering
//!
//! Engine and mod versions use `MAJOR.MINOR.PATCH[-suffix]`. Numeric segments
//! compare numerically, the suffix compares lexically, and a version without a
//! suffix sorts before the same triple with one.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::version::error::ResolverError;

/// A parsed `MAJOR.MINOR.PATCH[-suffix]` version.
///
/// Field order matters: the derived `Ord` compares major, minor, patch and
/// then the suffix, with `None` ordering before any `Some`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub suffix: Option<String>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            suffix: None,
        }
    }

    /// The `(major, minor)` pair identifying this version's minor line
    pub fn minor_line(&self) -> (u64, u64) {
        (self.major, self.minor)
    }

    /// `0.0.0` is used upstream as a placeholder for "no real version"
    pub fn is_placeholder(&self) -> bool {
        self.major == 0 && self.minor == 0 && self.patch == 0 && self.suffix.is_none()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "-{suffix}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s)
    }
}

/// Parse a version string, normalizing partial versions.
///
/// Accepts an optional leading `v` and pads partial versions with zeros.
/// Build metadata (`+...`) is rejected rather than ignored.
///
/// Examples:
/// - "1" -> 1.0.0
/// - "v3.9" -> 3.9.0
/// - "3.9.8-hotfix" -> 3.9.8 with suffix "hotfix"
pub fn parse_version(version: &str) -> Result<Version, ResolverError> {
    parse_with_precision(version).map(|(parsed, _)| parsed)
}

/// Parse a version and report how many numeric segments were written (1 to 3).
///
/// Range operators such as `~1.2` need the precision to pick their upper bound.
pub(crate) fn parse_with_precision(version: &str) -> Result<(Version, usize), ResolverError> {
    let trimmed = version.trim();
    let stripped = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

    if stripped.is_empty() {
        return Err(ResolverError::malformed(version, "empty version"));
    }

    let (core, suffix) = match stripped.split_once('-') {
        Some((core, suffix)) => (core, Some(suffix)),
        None => (stripped, None),
    };

    let segments = core.split('.').count();
    let padded = match segments {
        1 => format!("{core}.0.0"),
        2 => format!("{core}.0"),
        _ => core.to_string(),
    };
    let normalized = match suffix {
        Some(suffix) => format!("{padded}-{suffix}"),
        None => padded,
    };

    let parsed = semver::Version::parse(&normalized)
        .map_err(|e| ResolverError::malformed(version, e.to_string()))?;

    if !parsed.build.is_empty() {
        return Err(ResolverError::malformed(version, "build metadata is not supported"));
    }

    let suffix = (!parsed.pre.is_empty()).then(|| parsed.pre.as_str().to_string());

    Ok((
        Version {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            suffix,
        },
        segments.min(3),
    ))
}

/// Compare two version strings.
///
/// Fails on the first malformed input instead of falling back to a string
/// comparison.
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, ResolverError> {
    let a = parse_version(a)?;
    let b = parse_version(b)?;
    Ok(a.cmp(&b))
}

/// Check whether `candidate` is the tip of its minor line.
///
/// True when no version in `all_versions` shares the candidate's major.minor
/// and orders strictly after it.
pub fn is_latest_minor(candidate: &str, all_versions: &[String]) -> Result<bool, ResolverError> {
    let candidate = parse_version(candidate)?;

    for version in all_versions {
        let other = parse_version(version)?;
        if other.minor_line() == candidate.minor_line() && other > candidate {
            return Ok(false);
        }
    }

    Ok(true)
}
