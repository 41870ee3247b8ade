use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown visibility status {0:?}")]
pub struct UnknownStatus(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("Malformed version {version:?}: {reason}")]
    MalformedVersion { version: String, reason: String },

    #[error("Unsupported constraint {constraint:?}: {reason}")]
    UnsupportedConstraint { constraint: String, reason: String },
}

impl ResolverError {
    pub(crate) fn malformed(version: &str, reason: impl Into<String>) -> Self {
        ResolverError::MalformedVersion {
            version: version.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(constraint: &str, reason: impl Into<String>) -> Self {
        ResolverError::UnsupportedConstraint {
            constraint: constraint.to_string(),
            reason: reason.into(),
        }
    }
}
