//! Inter-mod dependency resolution
//!
//! Each declared dependency is matched on its own against the versions of the
//! mod it points at. There is no transitive solving: the result is the set of
//! dependency versions that satisfy the declared constraint, newest first.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::version::constraint::Constraint;
use crate::version::error::ResolverError;
use crate::version::semver::parse_version;
use crate::version::types::{Mod, ModDependency, ModVersion};

/// Outcome of matching one dependency constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDependency {
    /// Version of the mod declaring the dependency
    pub mod_version: String,
    pub dependency_mod_id: String,
    pub constraint: String,
    /// Matching dependency versions, newest first
    pub matching_versions: Vec<String>,
}

impl ResolvedDependency {
    /// Newest matching dependency version
    pub fn latest(&self) -> Option<&str> {
        self.matching_versions.first().map(String::as_str)
    }

    pub fn is_resolved(&self) -> bool {
        !self.matching_versions.is_empty()
    }
}

/// Resolve one dependency against the mods known to the batch.
///
/// A missing or disabled target mod resolves to no matches; an unsupported
/// constraint is an error.
pub fn resolve_dependency(
    mod_version: &ModVersion,
    dependency: &ModDependency,
    mods: &IndexMap<String, Mod>,
) -> Result<ResolvedDependency, ResolverError> {
    let constraint = Constraint::parse(&dependency.constraint)?;

    let mut matching = Vec::new();
    if let Some(target) = mods
        .get(&dependency.dependency_mod_id)
        .filter(|target| !target.disabled)
    {
        for candidate in target.versions.iter().filter(|v| v.is_publicly_available()) {
            let parsed = parse_version(&candidate.version)?;
            if constraint.satisfies(&parsed) {
                matching.push((parsed, candidate.version.clone()));
            }
        }
    }

    matching.sort_by(|(a, _), (b, _)| b.cmp(a));
    matching.dedup_by(|(a, _), (b, _)| a == b);

    Ok(ResolvedDependency {
        mod_version: mod_version.version.clone(),
        dependency_mod_id: dependency.dependency_mod_id.clone(),
        constraint: dependency.constraint.clone(),
        matching_versions: matching.into_iter().map(|(_, raw)| raw).collect(),
    })
}

/// Resolve every dependency declared by the publicly available versions of `m`
pub fn resolve_dependencies(
    m: &Mod,
    mods: &IndexMap<String, Mod>,
) -> Result<Vec<ResolvedDependency>, ResolverError> {
    m.versions
        .iter()
        .filter(|v| v.is_publicly_available())
        .flat_map(|v| v.dependencies.iter().map(move |dep| (v, dep)))
        .map(|(v, dep)| resolve_dependency(v, dep, mods))
        .collect()
}
