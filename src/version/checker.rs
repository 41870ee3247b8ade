//! Public listing eligibility for mods

use std::str::FromStr;

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::version::catalog::EngineCatalog;
use crate::version::dependency::ResolvedDependency;
use crate::version::error::{CacheError, ResolverError, UnknownStatus};
use crate::version::resolver::{
    eligible_versions, select_latest, select_latest_updated, total_downloads,
};
use crate::version::types::{EngineVersion, Mod};

/// Trait for storing the engine catalog and derived per-mod summaries
#[cfg_attr(test, automock)]
pub trait ResolutionStorer: Send + Sync + 'static {
    /// Get the stored engine catalog snapshot
    fn get_engine_versions(&self) -> Result<Vec<EngineVersion>, CacheError>;

    /// Replace the stored engine catalog snapshot
    fn replace_engine_versions(&self, versions: Vec<EngineVersion>) -> Result<(), CacheError>;

    /// Whether the stored catalog is missing or older than the refresh interval
    fn catalog_needs_refresh(&self) -> Result<bool, CacheError>;

    /// Take the resolution lock for a mod; false when another run holds it
    fn try_start_resolution(&self, mod_id: &str) -> Result<bool, CacheError>;

    /// Release the resolution lock for a mod
    fn finish_resolution(&self, mod_id: &str) -> Result<(), CacheError>;

    /// Persist a mod's resolution summary
    fn save_resolution(&self, resolution: &ModResolution) -> Result<(), CacheError>;

    /// Get a mod's stored resolution summary
    fn get_resolution(&self, mod_id: &str) -> Result<Option<ModResolution>, CacheError>;

    /// Replace the resolved dependencies of a mod
    fn replace_resolved_dependencies(
        &self,
        mod_id: &str,
        dependencies: &[ResolvedDependency],
    ) -> Result<(), CacheError>;

    /// Get mods whose summary is older than the refresh interval
    fn get_mods_needing_refresh(&self) -> Result<Vec<String>, CacheError>;
}

/// Why a mod is or is not publicly listed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityStatus {
    /// Listed and searchable
    Indexed,
    /// Mod is disabled
    Disabled,
    /// Mod has no publish timestamp
    Unpublished,
    /// No version is supported by any known engine version
    NoEligibleVersion,
    /// Latest version only supports engine versions outside the current minor lines
    Outdated,
}

impl VisibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityStatus::Indexed => "indexed",
            VisibilityStatus::Disabled => "disabled",
            VisibilityStatus::Unpublished => "unpublished",
            VisibilityStatus::NoEligibleVersion => "noEligibleVersion",
            VisibilityStatus::Outdated => "outdated",
        }
    }
}

impl FromStr for VisibilityStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "indexed" => Ok(VisibilityStatus::Indexed),
            "disabled" => Ok(VisibilityStatus::Disabled),
            "unpublished" => Ok(VisibilityStatus::Unpublished),
            "noEligibleVersion" => Ok(VisibilityStatus::NoEligibleVersion),
            "outdated" => Ok(VisibilityStatus::Outdated),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Derived facts for one mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModResolution {
    pub mod_id: String,
    /// Highest eligible version
    pub latest_version: Option<String>,
    /// Newest engine version supported by `latest_version`
    pub latest_engine_version: Option<String>,
    /// Most recently updated eligible version
    pub latest_updated_version: Option<String>,
    pub total_downloads: u64,
    pub status: VisibilityStatus,
}

impl ModResolution {
    pub fn should_be_indexed(&self) -> bool {
        self.status == VisibilityStatus::Indexed
    }
}

/// Resolve the derived facts and listing status of a mod
///
/// A disabled or unpublished mod gets its status from the gate alone. Its
/// summary fields are still filled in when its versions resolve, and left
/// empty when one of them is malformed.
pub fn resolve_mod(m: &Mod, catalog: &EngineCatalog) -> Result<ModResolution, ResolverError> {
    let gated = if m.disabled {
        Some(VisibilityStatus::Disabled)
    } else if m.published_at.is_none() {
        Some(VisibilityStatus::Unpublished)
    } else {
        None
    };

    let eligible = match (eligible_versions(&m.versions, catalog), gated) {
        (Ok(eligible), _) => eligible,
        (Err(_), Some(_)) => Vec::new(),
        (Err(e), None) => return Err(e),
    };
    let latest = select_latest(&eligible);
    let latest_updated = select_latest_updated(&eligible);

    let status = gated.unwrap_or(match latest {
        None => VisibilityStatus::NoEligibleVersion,
        Some(latest) if catalog.is_current(latest.latest_engine_version.version()) => {
            VisibilityStatus::Indexed
        }
        Some(_) => VisibilityStatus::Outdated,
    });

    Ok(ModResolution {
        mod_id: m.id.clone(),
        latest_version: latest.map(|l| l.mod_version.version.clone()),
        latest_engine_version: latest.map(|l| l.latest_engine_version.as_str().to_string()),
        latest_updated_version: latest_updated.map(|l| l.mod_version.version.clone()),
        total_downloads: total_downloads(m),
        status,
    })
}

/// Whether a mod is eligible for public listing and search.
///
/// Must be re-evaluated whenever the catalog changes: a newly published
/// engine minor line can push a mod out of the current set.
pub fn should_be_indexed(m: &Mod, catalog: &EngineCatalog) -> Result<bool, ResolverError> {
    Ok(resolve_mod(m, catalog)?.should_be_indexed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::types::ModVersion;
    use chrono::{DateTime, TimeZone, Utc};
    use rstest::rstest;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    fn mod_version(version: &str, constraint: &str) -> ModVersion {
        ModVersion {
            version: version.to_string(),
            spt_version_constraint: constraint.to_string(),
            updated_at: at(2),
            disabled: false,
            downloads: 10,
            dependencies: vec![],
        }
    }

    fn published_mod(versions: Vec<ModVersion>) -> Mod {
        Mod {
            id: "sain".to_string(),
            name: "SAIN".to_string(),
            disabled: false,
            published_at: Some(at(1)),
            versions,
        }
    }

    fn catalog(versions: &[&str]) -> EngineCatalog {
        EngineCatalog::new(versions.iter().map(|v| EngineVersion::new(*v)).collect()).unwrap()
    }

    const ENGINES: &[&str] = &["3.6.1", "3.7.0", "3.8.0", "3.9.0", "3.9.8", "3.10.0"];

    #[rstest]
    #[case("~3.10.0", VisibilityStatus::Indexed)]
    #[case("3.9.0", VisibilityStatus::Indexed)]
    #[case("~3.8.0", VisibilityStatus::Indexed)]
    #[case("3.7.0", VisibilityStatus::Outdated)]
    #[case("<3.8.0", VisibilityStatus::Outdated)]
    #[case("4.0.0", VisibilityStatus::NoEligibleVersion)]
    fn resolve_mod_status_follows_engine_support(
        #[case] constraint: &str,
        #[case] expected: VisibilityStatus,
    ) {
        let m = published_mod(vec![mod_version("1.0.0", constraint)]);

        let resolution = resolve_mod(&m, &catalog(ENGINES)).unwrap();

        assert_eq!(resolution.status, expected);
        assert_eq!(resolution.should_be_indexed(), expected == VisibilityStatus::Indexed);
    }

    #[test]
    fn resolve_mod_reports_disabled_before_version_checks() {
        let mut m = published_mod(vec![mod_version("1.0.0", "3.10.0")]);
        m.disabled = true;

        let resolution = resolve_mod(&m, &catalog(ENGINES)).unwrap();

        assert_eq!(resolution.status, VisibilityStatus::Disabled);
        assert_eq!(resolution.latest_version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn resolve_mod_reports_unpublished() {
        let mut m = published_mod(vec![mod_version("1.0.0", "3.10.0")]);
        m.published_at = None;

        assert!(!should_be_indexed(&m, &catalog(ENGINES)).unwrap());
        assert_eq!(
            resolve_mod(&m, &catalog(ENGINES)).unwrap().status,
            VisibilityStatus::Unpublished
        );
    }

    #[rstest]
    #[case(true, Some(at(1)), VisibilityStatus::Disabled)]
    #[case(false, None, VisibilityStatus::Unpublished)]
    fn gated_mod_with_malformed_version_keeps_its_status(
        #[case] disabled: bool,
        #[case] published_at: Option<DateTime<Utc>>,
        #[case] expected: VisibilityStatus,
    ) {
        let mut m = published_mod(vec![
            mod_version("1.0.0", "3.10.0"),
            mod_version("2.x.1", "3.10.0"),
        ]);
        m.disabled = disabled;
        m.published_at = published_at;

        let resolution = resolve_mod(&m, &catalog(ENGINES)).unwrap();

        assert_eq!(resolution.status, expected);
        assert_eq!(resolution.latest_version, None);
        assert_eq!(resolution.total_downloads, 20);
        assert!(!should_be_indexed(&m, &catalog(ENGINES)).unwrap());
    }

    #[test]
    fn listed_mod_with_malformed_version_fails() {
        let m = published_mod(vec![mod_version("2.x.1", "3.10.0")]);

        let err = resolve_mod(&m, &catalog(ENGINES)).unwrap_err();

        assert!(matches!(err, ResolverError::MalformedVersion { .. }));
    }

    #[test]
    fn resolve_mod_fills_summary_fields() {
        let mut newer_upload = mod_version("1.2.0", "~3.9.0");
        newer_upload.updated_at = at(20);
        let m = published_mod(vec![
            mod_version("1.0.0", "~3.8.0"),
            mod_version("2.0.0", ">=3.9.0"),
            newer_upload,
            mod_version("9.0.0", "4.0.0"),
        ]);

        let resolution = resolve_mod(&m, &catalog(ENGINES)).unwrap();

        assert_eq!(
            resolution,
            ModResolution {
                mod_id: "sain".to_string(),
                latest_version: Some("2.0.0".to_string()),
                latest_engine_version: Some("3.10.0".to_string()),
                latest_updated_version: Some("1.2.0".to_string()),
                total_downloads: 40,
                status: VisibilityStatus::Indexed,
            }
        );
    }

    #[test]
    fn new_engine_minor_line_retires_old_mods() {
        let m = published_mod(vec![mod_version("1.0.0", "~3.8.0")]);

        let before = catalog(&["3.8.0", "3.9.0", "3.10.0"]);
        let after = catalog(&["3.8.0", "3.9.0", "3.10.0", "3.11.0"]);

        assert!(should_be_indexed(&m, &before).unwrap());
        assert!(!should_be_indexed(&m, &after).unwrap());
    }

    #[test]
    fn empty_catalog_makes_every_mod_ineligible() {
        let m = published_mod(vec![mod_version("1.0.0", "*")]);

        let resolution = resolve_mod(&m, &EngineCatalog::default()).unwrap();

        assert_eq!(resolution.status, VisibilityStatus::NoEligibleVersion);
        assert_eq!(resolution.latest_version, None);
    }

    #[rstest]
    #[case(VisibilityStatus::Indexed)]
    #[case(VisibilityStatus::Disabled)]
    #[case(VisibilityStatus::Unpublished)]
    #[case(VisibilityStatus::NoEligibleVersion)]
    #[case(VisibilityStatus::Outdated)]
    fn visibility_status_string_form_parses_back(#[case] status: VisibilityStatus) {
        assert_eq!(status.as_str().parse::<VisibilityStatus>(), Ok(status));
    }

    #[rstest]
    #[case("")]
    #[case("Indexed")]
    #[case("hidden")]
    fn visibility_status_rejects_unknown_strings(#[case] input: &str) {
        let err = input.parse::<VisibilityStatus>().unwrap_err();

        assert_eq!(err, UnknownStatus(input.to_string()));
        assert_eq!(
            err.to_string(),
            format!("Unknown visibility status {input:?}")
        );
    }
}
