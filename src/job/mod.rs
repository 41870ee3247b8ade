//! Batch resolution job
//!
//! Runs outside any request path: loads a snapshot of engine versions and
//! mods, resolves every mod against the engine catalog and stores the derived
//! summaries.
//!
//! # Modules
//!
//! - [`snapshot`]: JSON input loading and validation under a [`MalformedPolicy`]
//! - [`refresh`]: One-shot and periodic resolution runs
//!
//! [`MalformedPolicy`]: crate::config::MalformedPolicy

pub mod refresh;
pub mod snapshot;

use std::path::PathBuf;

use thiserror::Error;

use crate::version::error::{CacheError, ResolverError};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Failed to read snapshot {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid snapshot {path:?}: {source}")]
    Snapshot {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Engine catalog rejected: {0}")]
    Catalog(#[source] ResolverError),

    #[error("Failed to resolve mod {mod_id}: {source}")]
    Resolver {
        mod_id: String,
        source: ResolverError,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Resolution task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
