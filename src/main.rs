use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use spt_version_resolver::config::{self, ResolverConfig};
use spt_version_resolver::job::refresh::{RunOptions, run_once, watch, watch_interval};
use spt_version_resolver::job::snapshot::{Snapshot, build_catalog};
use spt_version_resolver::logging::init_logging;
use spt_version_resolver::version::cache::Cache;
use spt_version_resolver::version::checker::ResolutionStorer;
use spt_version_resolver::version::semver::compare_versions;

#[derive(Parser)]
#[command(name = "spt-resolver")]
#[command(version, about = "Version resolution and listing gate for SPT mods")]
struct Cli {
    /// Config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path, defaults to the data directory
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve every mod in a snapshot and print the report as JSON
    Resolve {
        #[arg(long)]
        snapshot: PathBuf,

        /// Replace the stored engine catalog even if it is still fresh
        #[arg(long)]
        refresh_catalog: bool,

        /// Only resolve new mods and mods with stale summaries
        #[arg(long)]
        only_stale: bool,
    },

    /// Re-resolve a snapshot periodically until Ctrl-C
    Watch {
        #[arg(long)]
        snapshot: PathBuf,

        /// Seconds between runs, defaults to a quarter of the cache refresh interval
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show the stored listing status of a mod
    Check { mod_id: String },

    /// Compare two versions
    Compare { a: String, b: String },

    /// List the engine versions in the current minor lines
    Current {
        /// Read the catalog from a snapshot instead of the database
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

fn open_cache(db: Option<&Path>, config: &ResolverConfig) -> anyhow::Result<Cache> {
    let db_path = db.map(Path::to_path_buf).unwrap_or_else(config::db_path);
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create data directory {}", parent.display()))?;
    }

    Ok(Cache::new(
        &db_path,
        config.cache.refresh_interval,
        config.cache.resolution_timeout,
    )?)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ResolverConfig::load(cli.config.as_deref())?;

    let _guard = init_logging(&config.log, &config::log_path())?;
    let cache = || open_cache(cli.db.as_deref(), &config);

    match cli.command {
        Command::Resolve {
            snapshot,
            refresh_catalog,
            only_stale,
        } => {
            let options = RunOptions {
                policy: config.on_malformed,
                force_catalog_refresh: refresh_catalog,
                only_stale,
            };
            let report = run_once(&cache()?, Snapshot::load(&snapshot)?, options)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Watch { snapshot, interval } => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| watch_interval(config.cache.refresh_interval));
            let options = RunOptions {
                policy: config.on_malformed,
                force_catalog_refresh: false,
                only_stale: true,
            };

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(watch(Arc::new(cache()?), snapshot, options, interval))?;
        }
        Command::Check { mod_id } => match cache()?.get_resolution(&mod_id)? {
            Some(resolution) => {
                println!("{}: {}", resolution.mod_id, resolution.status.as_str());
                if let (Some(version), Some(engine)) =
                    (&resolution.latest_version, &resolution.latest_engine_version)
                {
                    println!("  latest {version} (SPT {engine})");
                }
                println!("  downloads {}", resolution.total_downloads);
            }
            None => anyhow::bail!("no resolution stored for mod {mod_id}"),
        },
        Command::Current { snapshot } => {
            let versions = match snapshot {
                Some(path) => Snapshot::load(&path)?.engine_versions,
                None => cache()?.get_engine_versions()?,
            };
            let (catalog, _) = build_catalog(versions, config.on_malformed)?;
            for entry in catalog.versions_for_last_three_minors() {
                println!("{} {}", entry.as_str(), entry.color_class());
            }
        }
        Command::Compare { a, b } => {
            let symbol = match compare_versions(&a, &b)? {
                Ordering::Less => "<",
                Ordering::Equal => "=",
                Ordering::Greater => ">",
            };
            println!("{a} {symbol} {b}");
        }
    }

    Ok(())
}
