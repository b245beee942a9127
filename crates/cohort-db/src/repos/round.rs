//! Round repository: lookup by id, listing per guild, create, full-row update.
//!
//! Members are stored as a JSON object keyed by member id.

use std::collections::BTreeMap;

use cohort_core::entities::{Member, Round};

use crate::CohortDb;
use crate::error::DatabaseError;
use crate::helpers::{self, format_datetime, get_u32, parse_datetime, parse_enum};

const ROUND_COLS: &str =
    "id, guild_id, number, title, content_url, stage, members, created_at, updated_at";

fn row_to_round(row: &libsql::Row) -> Result<Round, DatabaseError> {
    let members: BTreeMap<String, Member> = serde_json::from_str(&row.get::<String>(6)?)
        .map_err(|e| DatabaseError::Query(format!("Invalid members JSON: {e}")))?;
    Ok(Round {
        id: row.get(0)?,
        guild_id: row.get(1)?,
        number: get_u32(row, 2)?,
        title: row.get(3)?,
        content_url: row.get(4)?,
        stage: parse_enum(&row.get::<String>(5)?)?,
        members,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
        updated_at: parse_datetime(&row.get::<String>(8)?)?,
    })
}

fn members_json(round: &Round) -> Result<String, DatabaseError> {
    serde_json::to_string(&round.members).map_err(|e| DatabaseError::Other(e.into()))
}

pub(crate) async fn find_round(
    conn: &libsql::Connection,
    round_id: &str,
) -> Result<Option<Round>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {ROUND_COLS} FROM round WHERE id = ?1"),
            [round_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_round(&row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn find_rounds(
    conn: &libsql::Connection,
    guild_id: &str,
) -> Result<Vec<Round>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!(
                "SELECT {ROUND_COLS} FROM round WHERE guild_id = ?1
                 ORDER BY created_at DESC, number DESC"
            ),
            [guild_id],
        )
        .await?;
    let mut rounds = Vec::new();
    while let Some(row) = rows.next().await? {
        rounds.push(row_to_round(&row)?);
    }
    Ok(rounds)
}

pub(crate) async fn create_round(
    conn: &libsql::Connection,
    mut round: Round,
) -> Result<Round, DatabaseError> {
    round.id = super::generate_id(conn).await?;
    let now = helpers::now();
    round.created_at = now;
    round.updated_at = now;

    conn.execute(
        &format!("INSERT INTO round ({ROUND_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        libsql::params![
            round.id.as_str(),
            round.guild_id.as_str(),
            i64::from(round.number),
            round.title.as_str(),
            round.content_url.as_str(),
            round.stage.as_str(),
            members_json(&round)?,
            format_datetime(&round.created_at),
            format_datetime(&round.updated_at)
        ],
    )
    .await
    .map_err(DatabaseError::from_write)?;

    tracing::debug!(round_id = %round.id, number = round.number, "round created");
    Ok(round)
}

pub(crate) async fn update_round(
    conn: &libsql::Connection,
    mut round: Round,
) -> Result<Round, DatabaseError> {
    if round.id.is_empty() {
        return Err(DatabaseError::InvalidState(
            "cannot update a round without an id".into(),
        ));
    }
    round.updated_at = helpers::now();

    let changed = conn
        .execute(
            "UPDATE round SET number = ?1, title = ?2, content_url = ?3, stage = ?4,
                 members = ?5, updated_at = ?6
             WHERE id = ?7",
            libsql::params![
                i64::from(round.number),
                round.title.as_str(),
                round.content_url.as_str(),
                round.stage.as_str(),
                members_json(&round)?,
                format_datetime(&round.updated_at),
                round.id.as_str()
            ],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::NoResult);
    }
    Ok(round)
}

impl CohortDb {
    pub async fn find_round(&self, round_id: &str) -> Result<Option<Round>, DatabaseError> {
        let (_guard, conn) = self.shared().await;
        find_round(conn, round_id).await
    }

    /// All rounds of a guild, newest first.
    pub async fn find_rounds(&self, guild_id: &str) -> Result<Vec<Round>, DatabaseError> {
        let (_guard, conn) = self.shared().await;
        find_rounds(conn, guild_id).await
    }

    /// Insert a round, assigning its id and timestamps.
    pub async fn create_round(&self, round: Round) -> Result<Round, DatabaseError> {
        let (_guard, conn) = self.shared().await;
        create_round(conn, round).await
    }

    /// Persist every mutable field of `round` and refresh `updated_at`.
    pub async fn update_round(&self, round: Round) -> Result<Round, DatabaseError> {
        let (_guard, conn) = self.shared().await;
        update_round(conn, round).await
    }
}
