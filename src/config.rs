use serde::Deserialize;
use std::path::{Path, PathBuf};

use thiserror::Error;

// =============================================================================
// Time-related constants
// =============================================================================

/// Default catalog refresh interval in milliseconds (1 hour)
pub const DEFAULT_REFRESH_INTERVAL_MS: i64 = 60 * 60 * 1000;

/// A resolution lock older than this is considered abandoned (30 seconds)
pub const DEFAULT_RESOLUTION_TIMEOUT_MS: i64 = 30_000;

// =============================================================================
// Resolution constants
// =============================================================================

/// Number of newest minor lines whose engine versions count as "current"
pub const CURRENT_MINOR_LINES: usize = 3;

const APP_NAME: &str = "spt-version-resolver";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Resolver configuration structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolverConfig {
    pub cache: CacheConfig,
    pub on_malformed: MalformedPolicy,
    pub log: LogConfig,
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// How long a stored engine catalog stays fresh, in milliseconds
    pub refresh_interval: i64,
    /// How long a per-mod resolution lock is honoured, in milliseconds
    pub resolution_timeout: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL_MS,
            resolution_timeout: DEFAULT_RESOLUTION_TIMEOUT_MS,
        }
    }
}

/// What the batch job does with malformed versions and constraints
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MalformedPolicy {
    /// Log and drop the offending entry, keep going
    #[default]
    Skip,
    /// Stop the whole batch on the first error
    Abort,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Write the log file as JSON lines
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a JSON file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Returns the path to the data directory for spt-version-resolver.
/// Uses $XDG_DATA_HOME/spt-version-resolver if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/spt-version-resolver,
/// or ./spt-version-resolver if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the database file.
pub fn db_path() -> PathBuf {
    data_dir().join("resolutions.db")
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join(format!("{APP_NAME}.log"))
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join(APP_NAME)
}
