//! Common types shared by the catalog, resolver and batch job

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One published release of the host engine (SPT)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineVersion {
    /// Version string, e.g. "3.9.8"
    pub version: String,
    /// Display hint; derived by the catalog when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_class: Option<String>,
    /// Release page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl EngineVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            color_class: None,
            link: None,
        }
    }
}

/// A dependency declared by a mod version on another mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModDependency {
    /// Id of the mod being depended on
    pub dependency_mod_id: String,
    /// Constraint on the dependency mod's versions
    pub constraint: String,
}

/// One published release of a mod
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModVersion {
    pub version: String,
    /// Engine versions this release supports
    pub spt_version_constraint: String,
    pub updated_at: DateTime<Utc>,
    /// Hidden by a moderator or the author
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default)]
    pub dependencies: Vec<ModDependency>,
}

impl ModVersion {
    /// Releases are published as they are listed; only disabling hides one
    pub fn is_publicly_available(&self) -> bool {
        !self.disabled
    }
}

/// A mod and all of its versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mod {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub versions: Vec<ModVersion>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mod_from_minimal_object_uses_defaults() {
        let parsed = serde_json::from_value::<Mod>(json!({
            "id": "sain",
            "name": "SAIN",
            "versions": [{
                "version": "3.1.0",
                "sptVersionConstraint": "~3.9.0",
                "updatedAt": "2024-08-01T12:00:00Z"
            }]
        }))
        .unwrap();

        assert!(!parsed.disabled);
        assert_eq!(parsed.published_at, None);

        let version = &parsed.versions[0];
        assert_eq!(version.spt_version_constraint, "~3.9.0");
        assert_eq!(version.downloads, 0);
        assert!(version.dependencies.is_empty());
        assert!(version.is_publicly_available());
    }

    #[test]
    fn engine_version_omits_missing_hints_when_serialized() {
        let value = serde_json::to_value(EngineVersion::new("3.9.8")).unwrap();
        assert_eq!(value, json!({ "version": "3.9.8" }));
    }
}
