#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use spt_version_resolver::job::snapshot::Snapshot;
use spt_version_resolver::version::cache::Cache;
use spt_version_resolver::version::types::{EngineVersion, Mod, ModDependency, ModVersion};
use tempfile::TempDir;

pub const HOUR_MS: i64 = 60 * 60 * 1000;

pub fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
}

pub fn create_cache(refresh_interval: i64) -> (TempDir, Cache) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("resolutions.db");
    let cache = Cache::new(&db_path, refresh_interval, 30_000).unwrap();
    (temp_dir, cache)
}

pub fn engines(versions: &[&str]) -> Vec<EngineVersion> {
    versions.iter().map(|v| EngineVersion::new(*v)).collect()
}

pub fn mod_version(version: &str, constraint: &str, updated_day: u32) -> ModVersion {
    ModVersion {
        version: version.to_string(),
        spt_version_constraint: constraint.to_string(),
        updated_at: at(updated_day),
        disabled: false,
        downloads: 100,
        dependencies: vec![],
    }
}

pub fn depends_on(mut version: ModVersion, target: &str, constraint: &str) -> ModVersion {
    version.dependencies.push(ModDependency {
        dependency_mod_id: target.to_string(),
        constraint: constraint.to_string(),
    });
    version
}

pub fn published_mod(id: &str, versions: Vec<ModVersion>) -> Mod {
    Mod {
        id: id.to_string(),
        name: id.to_uppercase(),
        disabled: false,
        published_at: Some(at(1)),
        versions,
    }
}

pub fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> PathBuf {
    let path = dir.join("snapshot.json");
    std::fs::write(&path, serde_json::to_string_pretty(snapshot).unwrap()).unwrap();
    path
}
