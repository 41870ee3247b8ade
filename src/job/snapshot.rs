//! Snapshot input for the batch job
//!
//! A snapshot is a JSON document holding the engine catalog and the mods to
//! resolve:
//!
//! ```json
//! {
//!   "engineVersions": [{ "version": "3.10.0" }],
//!   "mods": [{ "id": "sain", "name": "SAIN", "versions": [] }]
//! }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::MalformedPolicy;
use crate::job::JobError;
use crate::version::catalog::EngineCatalog;
use crate::version::constraint::Constraint;
use crate::version::error::ResolverError;
use crate::version::semver::parse_version;
use crate::version::types::{EngineVersion, Mod};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Snapshot {
    pub engine_versions: Vec<EngineVersion>,
    pub mods: Vec<Mod>,
}

/// An entry dropped while validating a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Mod the entry belongs to; `None` for engine versions
    pub mod_id: Option<String>,
    pub reason: String,
}

impl Rejection {
    pub(crate) fn new(mod_id: Option<&str>, error: &impl std::fmt::Display) -> Self {
        Self {
            mod_id: mod_id.map(str::to_string),
            reason: error.to_string(),
        }
    }
}

impl Snapshot {
    /// Load a snapshot from a JSON file
    pub fn load(path: &Path) -> Result<Self, JobError> {
        let content = std::fs::read_to_string(path).map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| JobError::Snapshot {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Build an engine catalog under the given policy.
///
/// `Skip` drops malformed engine versions and reports them; `Abort` fails on
/// the first one.
pub fn build_catalog(
    versions: Vec<EngineVersion>,
    policy: MalformedPolicy,
) -> Result<(EngineCatalog, Vec<Rejection>), JobError> {
    match policy {
        MalformedPolicy::Abort => Ok((EngineCatalog::new(versions).map_err(JobError::Catalog)?, vec![])),
        MalformedPolicy::Skip => {
            let (catalog, rejected) = EngineCatalog::lenient(versions);
            let rejections = rejected
                .iter()
                .inspect(|e| warn!("Skipping engine version: {}", e))
                .map(|e| Rejection::new(None, e))
                .collect();
            Ok((catalog, rejections))
        }
    }
}

/// Validate every mod's versions and constraints under the given policy.
///
/// With `Skip`, a version with a malformed version string or engine
/// constraint is disabled (so it still counts towards downloads but is never
/// "latest"), and a malformed dependency constraint is dropped. With `Abort`
/// the first problem fails the batch.
///
/// Returns the mods keyed by id, in input order.
pub fn validate_mods(
    mods: Vec<Mod>,
    policy: MalformedPolicy,
) -> Result<(IndexMap<String, Mod>, Vec<Rejection>), JobError> {
    let mut rejections = Vec::new();
    let mut validated = IndexMap::with_capacity(mods.len());

    for mut m in mods {
        for version in m.versions.iter_mut().filter(|v| !v.disabled) {
            let checked = parse_version(&version.version)
                .and_then(|_| Constraint::parse(&version.spt_version_constraint));

            if let Err(e) = checked {
                reject(&m.id, e, policy, &mut rejections)?;
                version.disabled = true;
                continue;
            }

            let mut dependencies = Vec::with_capacity(version.dependencies.len());
            for dependency in version.dependencies.drain(..) {
                match Constraint::parse(&dependency.constraint) {
                    Ok(_) => dependencies.push(dependency),
                    Err(e) => reject(&m.id, e, policy, &mut rejections)?,
                }
            }
            version.dependencies = dependencies;
        }

        if validated.contains_key(&m.id) {
            warn!("Duplicate mod id {} in snapshot, keeping the last entry", m.id);
        }
        validated.insert(m.id.clone(), m);
    }

    Ok((validated, rejections))
}

fn reject(
    mod_id: &str,
    error: ResolverError,
    policy: MalformedPolicy,
    rejections: &mut Vec<Rejection>,
) -> Result<(), JobError> {
    match policy {
        MalformedPolicy::Abort => Err(JobError::Resolver {
            mod_id: mod_id.to_string(),
            source: error,
        }),
        MalformedPolicy::Skip => {
            warn!("Skipping entry of mod {}: {}", mod_id, error);
            rejections.push(Rejection::new(Some(mod_id), &error));
            Ok(())
        }
    }
}
