//! Engine compatibility constraints
//!
//! A mod version declares which engine versions it supports with one of:
//! - `1.2.3`, `=1.2.3` - exact match (suffix included)
//! - `!=1.2.3` - anything except that version
//! - `>=1.2.3`, `>1.2.3`, `<=1.2.3`, `<1.2.3` - comparison operators
//! - `^1.2.3` - compatible with version (>=1.2.3 <2.0.0, narrower for 0.x)
//! - `~1.2.3` - same minor line (>=1.2.3 <1.3.0); `~1.2` - same major (>=1.2.0 <2.0.0)
//! - `1.2.x`, `1.2.*`, `1.x`, `1.*`, `*` - wildcards
//! - `1.0.0 - 2.0.0` - inclusive hyphen range
//! - `>=1.0 <2.0` or `>=1.0, <2.0` - AND; `^1.0 || ^2.0` - OR
//!
//! Anything else fails with [`ResolverError::UnsupportedConstraint`] instead of
//! silently matching nothing (or everything).

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::version::error::ResolverError;
use crate::version::semver::{Version, parse_version, parse_with_precision};

/// Separators between AND terms: a comma (with optional spaces) or plain whitespace
static AND_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*|\s+").unwrap());

/// A bare operator written apart from its version, e.g. the `>=` in `>= 1.2`
static BARE_OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(>=|<=|!=|>|<|=|\^|~)$").unwrap());

/// A parsed constraint expression.
///
/// Stored as an OR of AND groups; a version satisfies the constraint when
/// every range of at least one group accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    source: String,
    groups: Vec<Vec<VersionRange>>,
}

impl Constraint {
    /// Parse a constraint expression
    pub fn parse(constraint: &str) -> Result<Self, ResolverError> {
        let trimmed = constraint.trim();
        if trimmed.is_empty() {
            return Err(ResolverError::unsupported(constraint, "empty constraint"));
        }

        let groups = trimmed
            .split("||")
            .map(|group| parse_group(constraint, group))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: constraint.to_string(),
            groups,
        })
    }

    /// The constraint text as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Check if a version satisfies this constraint
    pub fn satisfies(&self, version: &Version) -> bool {
        self.groups
            .iter()
            .any(|group| group.iter().all(|range| range.satisfies(version)))
    }
}

impl FromStr for Constraint {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraint::parse(s)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Check whether a single engine version satisfies a constraint expression.
///
/// Both inputs are validated: a malformed version fails with
/// `MalformedVersion`, unrecognized syntax with `UnsupportedConstraint`.
pub fn satisfies_constraint(constraint: &str, engine_version: &str) -> Result<bool, ResolverError> {
    let constraint = Constraint::parse(constraint)?;
    let version = parse_version(engine_version)?;
    Ok(constraint.satisfies(&version))
}

/// Parse one `||` alternative into its AND-ed ranges
fn parse_group(source: &str, group: &str) -> Result<Vec<VersionRange>, ResolverError> {
    let group = group.trim();
    if group.is_empty() {
        return Err(ResolverError::unsupported(source, "empty alternative around `||`"));
    }
    if group.contains('|') {
        return Err(ResolverError::unsupported(source, "single `|` is not an operator"));
    }

    // Hyphen ranges take the whole group: "1.0.0 - 2.0.0"
    if let Some((from, to)) = group.split_once(" - ") {
        let (from, _) = parse_operand(source, from)?;
        let (to, to_precision) = parse_operand(source, to)?;
        return Ok(vec![VersionRange::Hyphen {
            from,
            to,
            to_precision,
        }]);
    }

    let mut ranges = Vec::new();
    let mut terms = AND_SEPARATOR.split(group);

    while let Some(term) = terms.next() {
        if term.is_empty() {
            return Err(ResolverError::unsupported(source, "empty term between commas"));
        }

        if BARE_OPERATOR.is_match(term) {
            let Some(operand) = terms.next().filter(|t| !t.is_empty()) else {
                return Err(ResolverError::unsupported(
                    source,
                    format!("operator `{term}` has no version"),
                ));
            };
            ranges.push(VersionRange::parse(source, &format!("{term}{operand}"))?);
        } else {
            ranges.push(VersionRange::parse(source, term)?);
        }
    }

    Ok(ranges)
}

/// Parse the version part of a term, reporting failures against the whole constraint
fn parse_operand(source: &str, operand: &str) -> Result<(Version, usize), ResolverError> {
    parse_with_precision(operand.trim()).map_err(|e| match e {
        ResolverError::MalformedVersion { reason, .. } => ResolverError::unsupported(
            source,
            format!("invalid version {:?}: {reason}", operand.trim()),
        ),
        other => other,
    })
}

/// A single range term
#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionRange {
    /// Exact version match
    Exact(Version),
    /// Any version except this one
    NotEqual(Version),
    /// Greater than or equal
    Gte(Version),
    /// Greater than
    Gt(Version),
    /// Less than or equal
    Lte(Version),
    /// Less than
    Lt(Version),
    /// Caret range: ^1.2.3 means >=1.2.3 <2.0.0 (or narrower for 0.x)
    Caret { base: Version, precision: usize },
    /// Tilde range: ~1.2.3 means >=1.2.3 <1.3.0, ~1.2 means >=1.2.0 <2.0.0
    Tilde { base: Version, precision: usize },
    /// Any version: * matches all versions
    Any,
    /// Wildcard major: 1.x means >=1.0.0 <2.0.0
    WildcardMajor(u64),
    /// Wildcard minor: 1.2.x means >=1.2.0 <1.3.0
    WildcardMinor(u64, u64),
    /// Hyphen range: 1.0.0 - 2.0.0 means >=1.0.0 <=2.0.0.
    /// A partial upper bound covers its whole line: 1.0 - 2 means >=1.0.0 <3.0.0
    Hyphen {
        from: Version,
        to: Version,
        to_precision: usize,
    },
}

impl VersionRange {
    /// Parse a single term (no spaces, commas or `||`)
    fn parse(source: &str, term: &str) -> Result<Self, ResolverError> {
        if term == "*" || term.eq_ignore_ascii_case("x") {
            return Ok(VersionRange::Any);
        }

        let range = if let Some(rest) = term.strip_prefix(">=") {
            VersionRange::Gte(parse_operand(source, rest)?.0)
        } else if let Some(rest) = term.strip_prefix("<=") {
            VersionRange::Lte(parse_operand(source, rest)?.0)
        } else if let Some(rest) = term.strip_prefix("!=") {
            VersionRange::NotEqual(parse_operand(source, rest)?.0)
        } else if let Some(rest) = term.strip_prefix('>') {
            VersionRange::Gt(parse_operand(source, rest)?.0)
        } else if let Some(rest) = term.strip_prefix('<') {
            VersionRange::Lt(parse_operand(source, rest)?.0)
        } else if let Some(rest) = term.strip_prefix('=') {
            VersionRange::Exact(parse_operand(source, rest)?.0)
        } else if let Some(rest) = term.strip_prefix('^') {
            let (base, precision) = parse_operand(source, rest)?;
            VersionRange::Caret { base, precision }
        } else if let Some(rest) = term.strip_prefix('~') {
            let (base, precision) = parse_operand(source, rest)?;
            VersionRange::Tilde { base, precision }
        } else if let Some(range) = Self::parse_wildcard(term) {
            range
        } else {
            VersionRange::Exact(parse_operand(source, term)?.0)
        };

        Ok(range)
    }

    /// Parse wildcard patterns like "1.x", "1.*", "1.2.x" or "1.2.*"
    fn parse_wildcard(term: &str) -> Option<Self> {
        let is_wildcard = |s: &str| s == "*" || s.eq_ignore_ascii_case("x");
        let parts: Vec<&str> = term.split('.').collect();

        match parts.as_slice() {
            [major, x] if is_wildcard(*x) => {
                major.parse::<u64>().ok().map(VersionRange::WildcardMajor)
            }
            [major, minor, x] if is_wildcard(*x) => {
                let major = major.parse::<u64>().ok()?;
                let minor = minor.parse::<u64>().ok()?;
                Some(VersionRange::WildcardMinor(major, minor))
            }
            _ => None,
        }
    }

    /// Check if a version satisfies this range
    fn satisfies(&self, version: &Version) -> bool {
        match self {
            VersionRange::Exact(v) => version == v,
            VersionRange::NotEqual(v) => version != v,
            VersionRange::Gte(v) => version >= v,
            VersionRange::Gt(v) => version > v,
            VersionRange::Lte(v) => version <= v,
            VersionRange::Lt(v) => version < v,
            VersionRange::Caret { base, precision } => {
                version >= base && *version < caret_upper_bound(base, *precision)
            }
            VersionRange::Tilde { base, precision } => {
                version >= base && *version < tilde_upper_bound(base, *precision)
            }
            VersionRange::Any => true,
            VersionRange::WildcardMajor(major) => version.major == *major,
            VersionRange::WildcardMinor(major, minor) => {
                version.major == *major && version.minor == *minor
            }
            VersionRange::Hyphen {
                from,
                to,
                to_precision,
            } => {
                if version < from {
                    return false;
                }
                match to_precision {
                    1 => *version < Version::new(to.major.saturating_add(1), 0, 0),
                    2 => *version < Version::new(to.major, to.minor.saturating_add(1), 0),
                    _ => version <= to,
                }
            }
        }
    }
}

/// Exclusive upper bound of a caret range
///
/// ^1.2.3 -> 2.0.0, ^0.2.3 -> 0.3.0, ^0.0.3 -> 0.0.4, ^0.0 -> 0.1.0, ^0 -> 1.0.0
fn caret_upper_bound(base: &Version, precision: usize) -> Version {
    if base.major > 0 || precision == 1 {
        Version::new(base.major.saturating_add(1), 0, 0)
    } else if base.minor > 0 || precision == 2 {
        Version::new(0, base.minor.saturating_add(1), 0)
    } else {
        Version::new(0, 0, base.patch.saturating_add(1))
    }
}

/// Exclusive upper bound of a tilde range
///
/// ~1.2.3 -> 1.3.0, ~1.2 -> 2.0.0, ~1 -> 2.0.0
fn tilde_upper_bound(base: &Version, precision: usize) -> Version {
    if precision >= 3 {
        Version::new(base.major, base.minor.saturating_add(1), 0)
    } else {
        Version::new(base.major.saturating_add(1), 0, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn satisfied(constraint: &str, version: &str) -> bool {
        satisfies_constraint(constraint, version).unwrap()
    }

    #[rstest]
    #[case("3.9.8", "3.9.8", true)]
    #[case("3.9.8", "3.9.7", false)]
    #[case("=3.9.8", "3.9.8", true)]
    #[case("v3.9.8", "3.9.8", true)]
    #[case("3.9", "3.9.0", true)]
    #[case("3.9.8", "3.9.8-hotfix", false)]
    #[case("3.9.8-hotfix", "3.9.8-hotfix", true)]
    fn exact_match(#[case] constraint: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(satisfied(constraint, version), expected);
    }

    #[rstest]
    #[case(">=3.8.0", "3.8.0", true)]
    #[case(">=3.8.0", "3.7.9", false)]
    #[case(">3.8.0", "3.8.0", false)]
    #[case(">3.8.0", "3.8.0-hotfix", true)]
    #[case("<=3.8.0", "3.8.0", true)]
    #[case("<=3.8.0", "3.8.1", false)]
    #[case("<3.8.0", "3.7.99", true)]
    #[case("<3.8.0", "3.8.0", false)]
    #[case("!=3.8.0", "3.8.1", true)]
    #[case("!=3.8.0", "3.8.0", false)]
    #[case(">= 3.8", "3.10.0", true)]
    fn comparison_operators(
        #[case] constraint: &str,
        #[case] version: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(satisfied(constraint, version), expected);
    }

    #[rstest]
    // ^1.2.3 matches >=1.2.3 <2.0.0
    #[case("^1.2.3", "1.2.3", true)]
    #[case("^1.2.3", "1.9.9", true)]
    #[case("^1.2.3", "1.2.2", false)]
    #[case("^1.2.3", "2.0.0", false)]
    // ^0.2.3 matches >=0.2.3 <0.3.0
    #[case("^0.2.3", "0.2.9", true)]
    #[case("^0.2.3", "0.3.0", false)]
    // ^0.0.3 matches >=0.0.3 <0.0.4
    #[case("^0.0.3", "0.0.3", true)]
    #[case("^0.0.3", "0.0.4", false)]
    // ^0.0 matches >=0.0.0 <0.1.0
    #[case("^0.0", "0.0.7", true)]
    #[case("^0.0", "0.1.0", false)]
    fn caret_range(#[case] constraint: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(satisfied(constraint, version), expected);
    }

    #[rstest]
    #[case("~3.9.2", "3.9.2", true)]
    #[case("~3.9.2", "3.9.8", true)]
    #[case("~3.9.2", "3.9.1", false)]
    #[case("~3.9.2", "3.10.0", false)]
    #[case("~3.9", "3.10.0", true)]
    #[case("~3.9", "3.8.0", false)]
    #[case("~3.9", "4.0.0", false)]
    #[case("~3", "3.11.4", true)]
    fn tilde_range(#[case] constraint: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(satisfied(constraint, version), expected);
    }

    #[rstest]
    #[case("*", "0.0.1", true)]
    #[case("x", "99.0.0", true)]
    #[case("3.x", "3.11.0", true)]
    #[case("3.*", "4.0.0", false)]
    #[case("3.9.x", "3.9.8-hotfix", true)]
    #[case("3.9.*", "3.10.0", false)]
    fn wildcards(#[case] constraint: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(satisfied(constraint, version), expected);
    }

    #[rstest]
    #[case("3.8.0 - 3.9.0", "3.8.0", true)]
    #[case("3.8.0 - 3.9.0", "3.9.0", true)]
    #[case("3.8.0 - 3.9.0", "3.9.1", false)]
    #[case("3.8.0 - 3.9", "3.9.8", true)]
    #[case("3.8.0 - 3.9", "3.10.0", false)]
    #[case("3.8.0 - 3", "3.11.0", true)]
    fn hyphen_range(#[case] constraint: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(satisfied(constraint, version), expected);
    }

    #[rstest]
    #[case(">=3.8.0 <3.10.0", "3.9.8", true)]
    #[case(">=3.8.0 <3.10.0", "3.10.0", false)]
    #[case(">=3.8.0, <3.10.0", "3.9.0", true)]
    #[case(">=3.8.0,<3.10.0", "3.7.0", false)]
    #[case("~3.8.0 || ~3.10.0", "3.10.4", true)]
    #[case("~3.8.0 || ~3.10.0", "3.9.0", false)]
    #[case(">=3.0 <3.5 || 3.9.x", "3.9.1", true)]
    fn compound_ranges(#[case] constraint: &str, #[case] version: &str, #[case] expected: bool) {
        assert_eq!(satisfied(constraint, version), expected);
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("latest")]
    #[case("dev-master")]
    #[case("@stable")]
    #[case("3.9.0@beta")]
    #[case("3.9.0 | 3.10.0")]
    #[case("3.9.0 ||")]
    #[case(">=")]
    #[case(">= ")]
    #[case("== 3.9.0")]
    #[case("=>3.9.0")]
    #[case(">=3.9.0,,<4")]
    #[case("^3.x")]
    #[case("3.9.0+build")]
    #[case("3.9.0 -")]
    fn rejects_unsupported_syntax(#[case] constraint: &str) {
        let err = Constraint::parse(constraint).unwrap_err();
        assert!(
            matches!(err, ResolverError::UnsupportedConstraint { .. }),
            "expected UnsupportedConstraint for {constraint:?}, got {err:?}"
        );
    }

    #[test]
    fn satisfies_constraint_reports_malformed_engine_version() {
        let err = satisfies_constraint("3.9.0", "three").unwrap_err();
        assert!(matches!(err, ResolverError::MalformedVersion { .. }));
    }

    #[test]
    fn constraint_keeps_source_text() {
        let constraint: Constraint = "~3.9.0 || 3.10.x".parse().unwrap();
        assert_eq!(constraint.as_str(), "~3.9.0 || 3.10.x");
        assert_eq!(constraint.to_string(), "~3.9.0 || 3.10.x");
    }
}
