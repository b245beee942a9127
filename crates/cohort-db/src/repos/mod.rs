//! Repository queries for studies and rounds.
//!
//! Each query is a free function over `&libsql::Connection` so the same SQL
//! serves both plain reads on [`crate::CohortDb`] and transactional access on
//! [`crate::StoreTx`], which derefs to a connection.

pub mod round;
pub mod study;

use crate::error::DatabaseError;

/// Generate an opaque 24-character lowercase hex id via libSQL.
pub(crate) async fn generate_id(conn: &libsql::Connection) -> Result<String, DatabaseError> {
    let mut rows = conn.query("SELECT lower(hex(randomblob(12)))", ()).await?;
    let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
    Ok(row.get::<String>(0)?)
}
