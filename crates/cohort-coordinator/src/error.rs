//! Coordinator error type.

use cohort_core::errors::RoundError;
use cohort_db::error::DatabaseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// A domain rejection from a validator or mutator.
    #[error(transparent)]
    Round(#[from] RoundError),

    /// The store failed.
    #[error("Database error: {0}")]
    Database(DatabaseError),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

impl From<DatabaseError> for CoordinatorError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::Timeout(_) => Self::Round(RoundError::Timeout),
            other => Self::Database(other),
        }
    }
}

impl CoordinatorError {
    /// Stable machine-readable kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Round(err) => err.kind(),
            Self::Database(_) => "database",
            Self::UnknownCommand(_) => "unknown_command",
        }
    }

    /// The domain error, if this is one.
    #[must_use]
    pub const fn as_round_error(&self) -> Option<&RoundError> {
        match self {
            Self::Round(err) => Some(err),
            _ => None,
        }
    }

    /// Failures of the store or of a deadline, as opposed to rejections.
    #[must_use]
    pub const fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Round(RoundError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn database_timeout_becomes_round_timeout() {
        let err = CoordinatorError::from(DatabaseError::Timeout(Duration::from_secs(5)));
        assert_eq!(err.as_round_error(), Some(&RoundError::Timeout));
        assert!(err.is_infrastructure());
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn rejections_are_not_infrastructure() {
        let err = CoordinatorError::from(RoundError::RoundAlreadySet);
        assert!(!err.is_infrastructure());
        assert!(CoordinatorError::from(DatabaseError::NoResult).is_infrastructure());
    }
}
