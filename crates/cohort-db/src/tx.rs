//! Transactions spanning the `study` and `round` tables.

use std::time::Duration;

use libsql::TransactionBehavior;

use cohort_core::entities::{Round, Study};

use crate::CohortDb;
use crate::error::DatabaseError;
use crate::repos::{round as round_repo, study as study_repo};

/// An open write transaction.
///
/// Reads through a `StoreTx` observe writes made earlier in the same
/// transaction. Obtained from [`CohortDb::exec_tx`], which owns commit and
/// rollback.
pub struct StoreTx {
    tx: libsql::Transaction,
}

impl StoreTx {
    pub async fn find_study(&self, guild_id: &str) -> Result<Option<Study>, DatabaseError> {
        study_repo::find_study(&self.tx, guild_id).await
    }

    pub async fn find_round(&self, round_id: &str) -> Result<Option<Round>, DatabaseError> {
        round_repo::find_round(&self.tx, round_id).await
    }

    pub async fn find_rounds(&self, guild_id: &str) -> Result<Vec<Round>, DatabaseError> {
        round_repo::find_rounds(&self.tx, guild_id).await
    }

    pub async fn create_study(&self, study: Study) -> Result<Study, DatabaseError> {
        study_repo::create_study(&self.tx, study).await
    }

    pub async fn create_round(&self, round: Round) -> Result<Round, DatabaseError> {
        round_repo::create_round(&self.tx, round).await
    }

    pub async fn update_study(&self, study: Study) -> Result<Study, DatabaseError> {
        study_repo::update_study(&self.tx, study).await
    }

    pub async fn update_round(&self, round: Round) -> Result<Round, DatabaseError> {
        round_repo::update_round(&self.tx, round).await
    }

    async fn rollback_quietly(self) {
        if let Err(error) = self.tx.rollback().await {
            tracing::warn!(%error, "transaction rollback failed");
        }
    }
}

impl CohortDb {
    /// Run `f` inside a single transaction over studies and rounds.
    ///
    /// Other statements on this handle wait until the transaction has
    /// committed or rolled back.
    ///
    /// Commits when `f` returns `Ok`. Rolls back when `f` returns an error,
    /// when `max_commit_time` elapses before `f` completes (yielding
    /// `DatabaseError::Timeout`), or when the store fails.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or a `DatabaseError` converted into `E`.
    pub async fn exec_tx<T, E, F>(&self, max_commit_time: Duration, f: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&StoreTx) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let _exclusive = tokio::time::timeout(max_commit_time, self.gate.write())
            .await
            .map_err(|_| DatabaseError::Timeout(max_commit_time))?;
        let tx = self
            .conn()
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await
            .map_err(DatabaseError::from)?;
        let store_tx = StoreTx { tx };

        match tokio::time::timeout(max_commit_time, f(&store_tx)).await {
            Ok(Ok(value)) => {
                store_tx.tx.commit().await.map_err(DatabaseError::from)?;
                Ok(value)
            }
            Ok(Err(error)) => {
                store_tx.rollback_quietly().await;
                Err(error)
            }
            Err(_) => {
                tracing::warn!(?max_commit_time, "transaction timed out; rolling back");
                store_tx.rollback_quietly().await;
                Err(DatabaseError::Timeout(max_commit_time).into())
            }
        }
    }
}
