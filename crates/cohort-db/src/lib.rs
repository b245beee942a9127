//! # cohort-db
//!
//! libSQL persistence for Cohort studies and rounds.
//!
//! Two tables back the domain: `study` (one row per guild, unique on
//! `guild_id`) and `round` (one row per numbered cycle, members embedded as
//! JSON). Repository methods live on [`CohortDb`] for plain reads and on
//! [`StoreTx`] for reads and writes inside a transaction opened with
//! [`CohortDb::exec_tx`].

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod tx;

use cohort_config::DatabaseConfig;
use error::DatabaseError;
use libsql::Builder;
use tokio::sync::{RwLock, RwLockReadGuard};

pub use tx::StoreTx;

/// Central database handle for Cohort state.
///
/// Wraps a libSQL database and a single connection. Statements outside a
/// transaction run concurrently, but never while [`CohortDb::exec_tx`] has a
/// transaction open on the connection, so they cannot observe uncommitted
/// writes or be swept into a transaction that later rolls back.
pub struct CohortDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    gate: RwLock<()>,
}

impl CohortDb {
    /// Open a local database at the given path, or `":memory:"`.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        let cohort_db = Self {
            db,
            conn,
            gate: RwLock::new(()),
        };
        cohort_db.run_migrations().await?;
        Ok(cohort_db)
    }

    /// Open a remote libSQL database (e.g., Turso).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the connection or migrations fail.
    pub async fn open_remote(url: &str, auth_token: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await?;
        let conn = db.connect()?;
        let cohort_db = Self {
            db,
            conn,
            gate: RwLock::new(()),
        };
        cohort_db.run_migrations().await?;
        Ok(cohort_db)
    }

    /// Open whichever database the configuration selects.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if opening fails. Parent directories of a local
    /// path are created first.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.is_remote() {
            tracing::debug!(url = %config.url, "opening remote database");
            return Self::open_remote(&config.url, &config.auth_token).await;
        }
        if config.path != ":memory:"
            && let Some(parent) = std::path::Path::new(&config.path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::InvalidState(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        tracing::debug!(path = %config.path, "opening local database");
        Self::open_local(&config.path).await
    }

    /// Access the underlying libSQL connection for direct queries.
    ///
    /// Bypasses the transaction gate; repository methods go through
    /// [`CohortDb::shared`] instead.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// The connection, once no transaction is open on it. Holding the guard
    /// keeps new transactions from starting.
    pub(crate) async fn shared(&self) -> (RwLockReadGuard<'_, ()>, &libsql::Connection) {
        (self.gate.read().await, &self.conn)
    }

    /// Generate an opaque 24-character hex id.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self) -> Result<String, DatabaseError> {
        let (_guard, conn) = self.shared().await;
        repos::generate_id(conn).await
    }
}
