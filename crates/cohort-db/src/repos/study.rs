//! Study repository: lookup by guild, create, full-row update.

use cohort_core::entities::Study;

use crate::CohortDb;
use crate::error::DatabaseError;
use crate::helpers::{self, format_datetime, get_u32, parse_datetime, parse_enum};

const STUDY_COLS: &str = "id, guild_id, notice_channel_id, reflection_channel_id, manager_id, ongoing_round_id, spreadsheet_url, current_stage, total_round, created_at, updated_at";

fn row_to_study(row: &libsql::Row) -> Result<Study, DatabaseError> {
    Ok(Study {
        id: row.get(0)?,
        guild_id: row.get(1)?,
        notice_channel_id: row.get(2)?,
        reflection_channel_id: row.get(3)?,
        manager_id: row.get(4)?,
        ongoing_round_id: row.get(5)?,
        spreadsheet_url: row.get(6)?,
        current_stage: parse_enum(&row.get::<String>(7)?)?,
        total_round: get_u32(row, 8)?,
        created_at: parse_datetime(&row.get::<String>(9)?)?,
        updated_at: parse_datetime(&row.get::<String>(10)?)?,
    })
}

pub(crate) async fn find_study(
    conn: &libsql::Connection,
    guild_id: &str,
) -> Result<Option<Study>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {STUDY_COLS} FROM study WHERE guild_id = ?1"),
            [guild_id],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_study(&row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn create_study(
    conn: &libsql::Connection,
    mut study: Study,
) -> Result<Study, DatabaseError> {
    study.id = super::generate_id(conn).await?;
    let now = helpers::now();
    study.created_at = now;
    study.updated_at = now;

    conn.execute(
        &format!(
            "INSERT INTO study ({STUDY_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        libsql::params![
            study.id.as_str(),
            study.guild_id.as_str(),
            study.notice_channel_id.as_str(),
            study.reflection_channel_id.as_str(),
            study.manager_id.as_str(),
            study.ongoing_round_id.as_str(),
            study.spreadsheet_url.as_str(),
            study.current_stage.as_str(),
            i64::from(study.total_round),
            format_datetime(&study.created_at),
            format_datetime(&study.updated_at)
        ],
    )
    .await
    .map_err(DatabaseError::from_write)?;

    tracing::debug!(study_id = %study.id, guild_id = %study.guild_id, "study created");
    Ok(study)
}

pub(crate) async fn update_study(
    conn: &libsql::Connection,
    mut study: Study,
) -> Result<Study, DatabaseError> {
    if study.id.is_empty() {
        return Err(DatabaseError::InvalidState(
            "cannot update a study without an id".into(),
        ));
    }
    study.updated_at = helpers::now();

    let changed = conn
        .execute(
            "UPDATE study SET notice_channel_id = ?1, reflection_channel_id = ?2, manager_id = ?3,
                 ongoing_round_id = ?4, spreadsheet_url = ?5, current_stage = ?6,
                 total_round = ?7, updated_at = ?8
             WHERE id = ?9",
            libsql::params![
                study.notice_channel_id.as_str(),
                study.reflection_channel_id.as_str(),
                study.manager_id.as_str(),
                study.ongoing_round_id.as_str(),
                study.spreadsheet_url.as_str(),
                study.current_stage.as_str(),
                i64::from(study.total_round),
                format_datetime(&study.updated_at),
                study.id.as_str()
            ],
        )
        .await?;
    if changed == 0 {
        return Err(DatabaseError::NoResult);
    }
    Ok(study)
}

impl CohortDb {
    /// Find the study of a guild.
    pub async fn find_study(&self, guild_id: &str) -> Result<Option<Study>, DatabaseError> {
        let (_guard, conn) = self.shared().await;
        find_study(conn, guild_id).await
    }

    /// Insert a study, assigning its id and timestamps.
    ///
    /// Fails with `DatabaseError::Conflict` if the guild already has a study.
    pub async fn create_study(&self, study: Study) -> Result<Study, DatabaseError> {
        let (_guard, conn) = self.shared().await;
        create_study(conn, study).await
    }

    /// Persist every mutable field of `study` and refresh `updated_at`.
    pub async fn update_study(&self, study: Study) -> Result<Study, DatabaseError> {
        let (_guard, conn) = self.shared().await;
        update_study(conn, study).await
    }
}
