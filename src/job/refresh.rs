//! One-shot and periodic resolution runs

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::MalformedPolicy;
use crate::job::JobError;
use crate::job::snapshot::{Rejection, Snapshot, build_catalog, validate_mods};
use crate::version::catalog::EngineCatalog;
use crate::version::checker::{ModResolution, ResolutionStorer, resolve_mod};
use crate::version::dependency::resolve_dependencies;
use crate::version::types::{EngineVersion, Mod};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub policy: MalformedPolicy,
    /// Replace the stored catalog even if it is still fresh
    pub force_catalog_refresh: bool,
    /// Only resolve mods that are new or whose summary has gone stale.
    /// Ignored when the catalog was refreshed, since every summary depends on it.
    pub only_stale: bool,
}

/// Outcome of a resolution run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    /// Whether the stored catalog was replaced from the snapshot
    pub catalog_refreshed: bool,
    pub resolutions: IndexMap<String, ModResolution>,
    /// Mods another run was already resolving
    pub skipped: Vec<String>,
    /// Mods that hit a storage error while locking or storing
    pub failed: Vec<String>,
    pub rejected: Vec<Rejection>,
}

impl ResolutionReport {
    pub fn indexed_count(&self) -> usize {
        self.resolutions
            .values()
            .filter(|r| r.should_be_indexed())
            .count()
    }
}

/// Engine catalog chosen for a run
pub struct LoadedCatalog {
    pub catalog: EngineCatalog,
    pub refreshed: bool,
    pub rejections: Vec<Rejection>,
}

/// Use the stored catalog while it is fresh, otherwise replace it with the
/// snapshot's engine versions.
///
/// The snapshot is validated before anything is stored, so an aborted run
/// leaves the previous catalog in place.
pub fn load_catalog<S: ResolutionStorer>(
    storer: &S,
    snapshot_versions: Vec<EngineVersion>,
    options: &RunOptions,
) -> Result<LoadedCatalog, JobError> {
    if options.force_catalog_refresh || storer.catalog_needs_refresh()? {
        let (catalog, rejections) = build_catalog(snapshot_versions.clone(), options.policy)?;
        storer.replace_engine_versions(snapshot_versions)?;
        info!("Refreshed engine catalog with {} versions", catalog.len());

        return Ok(LoadedCatalog {
            catalog,
            refreshed: true,
            rejections,
        });
    }

    let stored = storer.get_engine_versions()?;
    debug!("Using stored engine catalog with {} versions", stored.len());
    let (catalog, rejections) = build_catalog(stored, options.policy)?;

    Ok(LoadedCatalog {
        catalog,
        refreshed: false,
        rejections,
    })
}

/// Resolve a single mod and persist its summary and dependencies
fn resolve_and_store<S: ResolutionStorer>(
    storer: &S,
    catalog: &EngineCatalog,
    m: &Mod,
    mods: &IndexMap<String, Mod>,
) -> Result<ModResolution, JobError> {
    let resolver_error = |source| JobError::Resolver {
        mod_id: m.id.clone(),
        source,
    };

    let resolution = resolve_mod(m, catalog).map_err(resolver_error)?;
    let dependencies = resolve_dependencies(m, mods).map_err(resolver_error)?;

    storer.save_resolution(&resolution)?;
    storer.replace_resolved_dependencies(&m.id, &dependencies)?;

    debug!(
        "Resolved {}: {} ({} dependencies)",
        m.id,
        resolution.status.as_str(),
        dependencies.len()
    );

    Ok(resolution)
}

/// Resolve the mods named by `targets` and store their summaries.
///
/// Uses try_start_resolution/finish_resolution so that concurrent runs never
/// resolve the same mod twice. Storage errors are logged and the mod is
/// reported as failed; resolver errors follow `policy`.
pub fn resolve_mods<S: ResolutionStorer>(
    storer: &S,
    catalog: &EngineCatalog,
    mods: &IndexMap<String, Mod>,
    targets: &[&str],
    policy: MalformedPolicy,
) -> Result<ResolutionReport, JobError> {
    let mut report = ResolutionReport::default();

    for &mod_id in targets {
        let Some(m) = mods.get(mod_id) else {
            warn!("Unknown mod {} requested, skipping", mod_id);
            continue;
        };

        match storer.try_start_resolution(mod_id) {
            Ok(true) => {}
            Ok(false) => {
                info!("Skipping {}: already being resolved by another run", mod_id);
                report.skipped.push(mod_id.to_string());
                continue;
            }
            Err(e) => {
                error!("Failed to start resolution for {}: {}", mod_id, e);
                report.failed.push(mod_id.to_string());
                continue;
            }
        }

        let outcome = resolve_and_store(storer, catalog, m, mods);

        // Release the lock regardless of the outcome
        let _ = storer
            .finish_resolution(mod_id)
            .inspect_err(|e| error!("Failed to finish resolution for {}: {}", mod_id, e));

        match outcome {
            Ok(resolution) => {
                report.resolutions.insert(mod_id.to_string(), resolution);
            }
            Err(JobError::Resolver { mod_id, source }) if policy == MalformedPolicy::Skip => {
                warn!("Skipping mod {}: {}", mod_id, source);
                report.rejected.push(Rejection::new(Some(mod_id.as_str()), &source));
            }
            Err(e @ JobError::Resolver { .. }) => return Err(e),
            Err(e) => {
                error!("Failed to store resolution for {}: {}", mod_id, e);
                report.failed.push(mod_id.to_string());
            }
        }
    }

    Ok(report)
}

/// Mods that have no stored summary yet or whose summary is stale
fn stale_mod_ids<'a, S: ResolutionStorer>(
    storer: &S,
    mods: &'a IndexMap<String, Mod>,
) -> Result<Vec<&'a str>, JobError> {
    let stale: HashSet<String> = storer.get_mods_needing_refresh()?.into_iter().collect();

    let mut ids = Vec::new();
    for id in mods.keys() {
        if stale.contains(id) || storer.get_resolution(id)?.is_none() {
            ids.push(id.as_str());
        }
    }

    Ok(ids)
}

/// Validate a snapshot, pick the catalog and resolve its mods
pub fn run_once<S: ResolutionStorer>(
    storer: &S,
    snapshot: Snapshot,
    options: RunOptions,
) -> Result<ResolutionReport, JobError> {
    let loaded = load_catalog(storer, snapshot.engine_versions, &options)?;
    let (mods, mod_rejections) = validate_mods(snapshot.mods, options.policy)?;

    let targets: Vec<&str> = if options.only_stale && !loaded.refreshed {
        stale_mod_ids(storer, &mods)?
    } else {
        mods.keys().map(String::as_str).collect()
    };
    debug!("Resolving {} of {} mods", targets.len(), mods.len());

    let mut report = resolve_mods(storer, &loaded.catalog, &mods, &targets, options.policy)?;

    report.catalog_refreshed = loaded.refreshed;
    let mut rejected = loaded.rejections;
    rejected.extend(mod_rejections);
    rejected.append(&mut report.rejected);
    report.rejected = rejected;

    info!(
        "Resolved {} mods ({} indexed, {} skipped, {} failed, {} rejected entries)",
        report.resolutions.len(),
        report.indexed_count(),
        report.skipped.len(),
        report.failed.len(),
        report.rejected.len()
    );

    Ok(report)
}

/// Ticks per refresh interval when watching
pub const WATCH_TICKS_PER_REFRESH: i64 = 4;

const MIN_WATCH_INTERVAL_MS: i64 = 50;

/// Default tick for [`watch`], a fraction of the refresh interval.
///
/// Staleness is checked with a strict comparison against the interval, so a
/// tick equal to it would see every other run find nothing stale.
pub fn watch_interval(refresh_interval_ms: i64) -> Duration {
    let tick = (refresh_interval_ms / WATCH_TICKS_PER_REFRESH).max(MIN_WATCH_INTERVAL_MS);
    Duration::from_millis(tick as u64)
}

/// Re-run resolution on a fixed interval until `shutdown` completes.
///
/// Each tick reloads the snapshot file, so new engine versions and mods are
/// picked up without a restart. A failed run is logged and retried on the
/// next tick.
pub async fn watch_until<S, F>(
    storer: Arc<S>,
    snapshot_path: PathBuf,
    options: RunOptions,
    interval: Duration,
    shutdown: F,
) -> Result<(), JobError>
where
    S: ResolutionStorer,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let storer = Arc::clone(&storer);
                let path = snapshot_path.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let snapshot = Snapshot::load(&path)?;
                    run_once(&*storer, snapshot, options)
                })
                .await?;

                if let Err(e) = result {
                    error!("Resolution run failed: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("Stopping periodic resolution");
                return Ok(());
            }
        }
    }
}

/// Re-run resolution on a fixed interval until Ctrl-C
pub async fn watch<S: ResolutionStorer>(
    storer: Arc<S>,
    snapshot_path: PathBuf,
    options: RunOptions,
    interval: Duration,
) -> Result<(), JobError> {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    watch_until(storer, snapshot_path, options, interval, shutdown).await
}
