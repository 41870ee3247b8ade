//! Latest mod version resolution
//!
//! A mod version is *eligible* when it is not disabled and its engine
//! constraint is satisfied by at least one catalog version. "Latest" is chosen
//! among eligible versions only:
//! - latest version: highest version, ties broken by the most recent update
//! - latest updated version: most recent update, ties broken by highest version

use std::cmp::Ordering;

use crate::version::catalog::{CatalogEntry, EngineCatalog};
use crate::version::constraint::Constraint;
use crate::version::error::ResolverError;
use crate::version::semver::{Version, parse_version};
use crate::version::types::{Mod, ModVersion};

/// A mod version together with the engine versions that satisfy it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleVersion<'a> {
    pub mod_version: &'a ModVersion,
    pub version: Version,
    /// Newest satisfying engine version
    pub latest_engine_version: &'a CatalogEntry,
    /// All satisfying engine versions, newest first (never empty)
    pub engine_versions: Vec<&'a CatalogEntry>,
}

impl EligibleVersion<'_> {
    fn cmp_by_version(&self, other: &Self) -> Ordering {
        self.version
            .cmp(&other.version)
            .then_with(|| self.mod_version.updated_at.cmp(&other.mod_version.updated_at))
    }

    fn cmp_by_update(&self, other: &Self) -> Ordering {
        self.mod_version
            .updated_at
            .cmp(&other.mod_version.updated_at)
            .then_with(|| self.version.cmp(&other.version))
    }
}

/// Catalog versions satisfying a mod version's engine constraint, newest first
pub fn compatible_engine_versions<'a>(
    mod_version: &ModVersion,
    catalog: &'a EngineCatalog,
) -> Result<Vec<&'a CatalogEntry>, ResolverError> {
    let constraint = Constraint::parse(&mod_version.spt_version_constraint)?;
    Ok(catalog.satisfying(&constraint))
}

/// All eligible versions, in input order.
///
/// Disabled versions are skipped without being parsed. A malformed version string or constraint on an available version
/// fails the whole call.
pub fn eligible_versions<'a>(
    versions: &'a [ModVersion],
    catalog: &'a EngineCatalog,
) -> Result<Vec<EligibleVersion<'a>>, ResolverError> {
    let mut eligible = Vec::new();

    for mod_version in versions.iter().filter(|v| v.is_publicly_available()) {
        let version = parse_version(&mod_version.version)?;
        let engine_versions = compatible_engine_versions(mod_version, catalog)?;

        let Some(latest_engine_version) = engine_versions.first().copied() else {
            continue;
        };

        eligible.push(EligibleVersion {
            mod_version,
            version,
            latest_engine_version,
            engine_versions,
        });
    }

    Ok(eligible)
}

/// The eligible version with the highest version number.
///
/// Returns `None` when no version has a satisfying engine version; that is a
/// valid state, not an error.
pub fn latest_eligible_version<'a>(
    versions: &'a [ModVersion],
    catalog: &'a EngineCatalog,
) -> Result<Option<EligibleVersion<'a>>, ResolverError> {
    let eligible = eligible_versions(versions, catalog)?;
    Ok(select_latest(&eligible).cloned())
}

/// The eligible version updated most recently
pub fn latest_updated_version<'a>(
    versions: &'a [ModVersion],
    catalog: &'a EngineCatalog,
) -> Result<Option<EligibleVersion<'a>>, ResolverError> {
    let eligible = eligible_versions(versions, catalog)?;
    Ok(select_latest_updated(&eligible).cloned())
}

pub(crate) fn select_latest<'e, 'a>(
    eligible: &'e [EligibleVersion<'a>],
) -> Option<&'e EligibleVersion<'a>> {
    eligible.iter().max_by(|a, b| a.cmp_by_version(b))
}

pub(crate) fn select_latest_updated<'e, 'a>(
    eligible: &'e [EligibleVersion<'a>],
) -> Option<&'e EligibleVersion<'a>> {
    eligible.iter().max_by(|a, b| a.cmp_by_update(b))
}

/// Downloads across every version, eligible or not
pub fn total_downloads(m: &Mod) -> u64 {
    m.versions
        .iter()
        .fold(0u64, |total, v| total.saturating_add(v.downloads))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::types::EngineVersion;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    fn mod_version(version: &str, constraint: &str, updated_day: u32) -> ModVersion {
        ModVersion {
            version: version.to_string(),
            spt_version_constraint: constraint.to_string(),
            updated_at: at(updated_day),
            disabled: false,
            downloads: 0,
            dependencies: vec![],
        }
    }

    fn catalog(versions: &[&str]) -> EngineCatalog {
        EngineCatalog::new(versions.iter().map(|v| EngineVersion::new(*v)).collect()).unwrap()
    }

    #[test]
    fn latest_eligible_version_skips_versions_without_engine_support() {
        let versions = vec![
            mod_version("1.0.0", "1.0.0", 1),
            mod_version("2.0.0", "9.9.9", 2),
        ];
        let catalog = catalog(&["1.0.0"]);

        let latest = latest_eligible_version(&versions, &catalog).unwrap().unwrap();

        assert_eq!(latest.mod_version.version, "1.0.0");
        assert_eq!(latest.latest_engine_version.as_str(), "1.0.0");
    }

    #[test]
    fn latest_eligible_version_accepts_plain_release_records() {
        let versions: Vec<ModVersion> = serde_json::from_value(serde_json::json!([
            { "version": "1.0.0", "sptVersionConstraint": "1.0.0", "updatedAt": "2024-06-01T12:00:00Z" },
            { "version": "2.0.0", "sptVersionConstraint": "9.9.9", "updatedAt": "2024-06-02T12:00:00Z" }
        ]))
        .unwrap();
        let catalog = catalog(&["1.0.0"]);

        let latest = latest_eligible_version(&versions, &catalog).unwrap().unwrap();

        assert_eq!(latest.mod_version.version, "1.0.0");
        assert_eq!(latest.latest_engine_version.as_str(), "1.0.0");
    }

    #[test]
    fn latest_eligible_version_compares_numerically() {
        let versions = vec![
            mod_version("10.0.0", "*", 1),
            mod_version("2.0.0", "*", 5),
            mod_version("9.1.0", "*", 3),
        ];
        let catalog = catalog(&["3.9.0"]);

        let latest = latest_eligible_version(&versions, &catalog).unwrap().unwrap();

        assert_eq!(latest.mod_version.version, "10.0.0");
    }

    #[test]
    fn latest_eligible_version_breaks_ties_by_most_recent_update() {
        let versions = vec![
            mod_version("1.0.0", "3.9.0", 3),
            mod_version("1.0.0", "3.9.0", 7),
            mod_version("1.0.0", "3.9.0", 5),
        ];
        let catalog = catalog(&["3.9.0"]);

        let latest = latest_eligible_version(&versions, &catalog).unwrap().unwrap();

        assert_eq!(latest.mod_version.updated_at, at(7));
    }

    #[test]
    fn latest_eligible_version_returns_none_when_nothing_is_supported() {
        let versions = vec![mod_version("1.0.0", "~3.10.0", 1)];
        let catalog = catalog(&["3.9.0"]);

        assert_eq!(latest_eligible_version(&versions, &catalog).unwrap(), None);
    }

    #[test]
    fn latest_eligible_version_returns_none_for_empty_catalog() {
        let versions = vec![mod_version("1.0.0", "*", 1)];

        assert_eq!(
            latest_eligible_version(&versions, &EngineCatalog::default()).unwrap(),
            None
        );
    }

    #[test]
    fn latest_eligible_version_ignores_disabled_versions() {
        let mut disabled = mod_version("3.0.0", "3.9.0", 1);
        disabled.disabled = true;
        let versions = vec![mod_version("1.0.0", "3.9.0", 1), disabled];
        let catalog = catalog(&["3.9.0"]);

        let latest = latest_eligible_version(&versions, &catalog).unwrap().unwrap();

        assert_eq!(latest.mod_version.version, "1.0.0");
    }

    #[test]
    fn latest_eligible_version_fails_on_malformed_version() {
        let versions = vec![mod_version("one", "3.9.0", 1)];
        let catalog = catalog(&["3.9.0"]);

        let err = latest_eligible_version(&versions, &catalog).unwrap_err();
        assert!(matches!(err, ResolverError::MalformedVersion { .. }));
    }

    #[test]
    fn latest_eligible_version_fails_on_unsupported_constraint() {
        let versions = vec![mod_version("1.0.0", "dev-master", 1)];
        let catalog = catalog(&["3.9.0"]);

        let err = latest_eligible_version(&versions, &catalog).unwrap_err();
        assert!(matches!(err, ResolverError::UnsupportedConstraint { .. }));
    }

    #[test]
    fn latest_eligible_version_is_idempotent() {
        let versions = vec![
            mod_version("1.0.0", "~3.8.0", 1),
            mod_version("1.1.0", "~3.9.0", 2),
        ];
        let catalog = catalog(&["3.8.0", "3.9.0"]);

        let first = latest_eligible_version(&versions, &catalog).unwrap();
        let second = latest_eligible_version(&versions, &catalog).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn latest_updated_version_prefers_most_recent_update() {
        let versions = vec![
            mod_version("2.0.0", "3.9.0", 1),
            mod_version("1.5.0", "3.9.0", 9),
            mod_version("1.9.0", "9.9.9", 20),
        ];
        let catalog = catalog(&["3.9.0"]);

        let latest = latest_updated_version(&versions, &catalog).unwrap().unwrap();

        assert_eq!(latest.mod_version.version, "1.5.0");
    }

    #[test]
    fn compatible_engine_versions_lists_newest_first() {
        let version = mod_version("1.0.0", ">=3.8.0", 1);
        let catalog = catalog(&["3.7.0", "3.8.0", "3.9.0"]);

        let engines: Vec<&str> = compatible_engine_versions(&version, &catalog)
            .unwrap()
            .into_iter()
            .map(|e| e.as_str())
            .collect();

        assert_eq!(engines, vec!["3.9.0", "3.8.0"]);
    }

    #[test]
    fn total_downloads_counts_every_version() {
        let mut eligible = mod_version("1.0.0", "3.9.0", 1);
        eligible.downloads = 40;
        let mut unsupported = mod_version("2.0.0", "9.9.9", 1);
        unsupported.downloads = 2;
        let mut disabled = mod_version("0.9.0", "3.9.0", 1);
        disabled.disabled = true;
        disabled.downloads = 100;

        let m = Mod {
            id: "sain".to_string(),
            name: "SAIN".to_string(),
            disabled: false,
            published_at: Some(at(1)),
            versions: vec![eligible, unsupported, disabled],
        };

        assert_eq!(total_downloads(&m), 142);
    }
}
