//! Error taxonomy for the retrieval engines.
//!
//! Read-only engines surface every variant to the caller. Consolidation maps
//! [`RecallError::PathViolation`] and [`RecallError::ContentIo`] to per-turn
//! outcomes instead of propagating them.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by every engine entry point.
pub type Result<T> = std::result::Result<T, RecallError>;

#[derive(Error, Debug)]
pub enum RecallError {
    /// A referenced seed turn, session, agent, or checkpoint does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Conflicting or malformed caller-supplied filters.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// A stored content path resolves outside the managed content root.
    #[error("content path escapes content root: {path}")]
    PathViolation { path: String },

    /// Reading or removing an external content file failed.
    #[error("content I/O failed for {}: {source}", path.display())]
    ContentIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecallError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = RecallError::not_found("turn", "abc123");
        assert_eq!(err.to_string(), "turn not found: abc123");
    }

    #[test]
    fn database_errors_convert() {
        let err: RecallError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, RecallError::Database(_)));
    }
}
