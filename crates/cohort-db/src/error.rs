//! Database error types for cohort-db.

use std::time::Duration;

use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed or returned malformed data.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., updating an entity without an id).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The transaction did not finish within its commit deadline.
    #[error("Transaction exceeded max commit time of {0:?}")]
    Timeout(Duration),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Map a libSQL error, recognizing unique-constraint violations.
    pub(crate) fn from_write(error: libsql::Error) -> Self {
        let msg = error.to_string();
        if msg.contains("UNIQUE constraint failed") {
            Self::Conflict(msg)
        } else {
            Self::LibSql(error)
        }
    }
}
