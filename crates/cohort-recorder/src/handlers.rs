//! Event handlers that write round history to a [`TabularLog`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde_json::{Value, json};

use cohort_bus::Message;
use cohort_core::entities::Round;
use cohort_core::events::EventEnvelope;

use crate::error::RecorderError;
use crate::tabular::{Row, TabularLog};

/// Title of the sheet receiving one row per progress, creation or error event.
pub const PROGRESS_SHEET: &str = "진행 로그";

/// Handles messages of one or more topics.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<(), RecorderError>;
}

/// Round numbers restart per guild, so the guild id keeps titles distinct
/// when several guilds share one spreadsheet.
#[must_use]
pub fn round_sheet_title(round: &Round) -> String {
    format!("{} 라운드: {} ({})", round.number, round.title, round.guild_id)
}

/// A `HYPERLINK` formula showing the url itself, or an empty cell.
#[must_use]
pub fn hyperlink(url: &str) -> Value {
    if url.is_empty() {
        return json!("");
    }
    let escaped = url.replace('"', "\"\"");
    json!(format!("=HYPERLINK(\"{escaped}\",\"{escaped}\")"))
}

/// Header block, column header and one row per member, in member id order.
#[must_use]
pub fn round_rows(round: &Round) -> Vec<Row> {
    let mut rows = vec![
        vec![json!("제목"), json!(round.title)],
        vec![json!("단계"), json!(round.stage.label())],
        vec![json!("녹화 링크"), hyperlink(&round.content_url)],
        vec![
            json!("생성 시각"),
            json!(round.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ],
        vec![
            json!("수정 시각"),
            json!(round.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        ],
        vec![
            json!("멤버 ID"),
            json!("이름"),
            json!("주제"),
            json!("발표 자료"),
            json!("출석"),
        ],
    ];
    rows.extend(round.members.iter().map(|(id, member)| {
        vec![
            json!(id),
            json!(member.name),
            json!(member.subject),
            hyperlink(&member.content_url),
            json!(member.attended),
        ]
    }));
    rows
}

#[must_use]
pub fn progress_row(envelope: &EventEnvelope) -> Row {
    let timestamp = DateTime::from_timestamp(envelope.timestamp, 0).map_or_else(
        || envelope.timestamp.to_string(),
        |dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    vec![
        json!(envelope.topic),
        json!(envelope.description),
        json!(timestamp),
    ]
}

/// Writes a closed round to its own sheet.
///
/// Redeliveries are absorbed: a round whose sheet already holds rows is
/// skipped, and a sheet left empty by an earlier failed attempt is filled.
pub struct RoundClosedHandler {
    log: Arc<dyn TabularLog>,
}

impl RoundClosedHandler {
    pub fn new(log: Arc<dyn TabularLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Handler for RoundClosedHandler {
    async fn handle(&self, message: &Message) -> Result<(), RecorderError> {
        let round: Round = serde_json::from_slice(&message.payload)?;
        let title = round_sheet_title(&round);

        if self.log.sheet_titles().await?.contains(&title) {
            if self.log.row_count(&title).await? > 0 {
                tracing::info!(title, "round already recorded; skipping");
                return Ok(());
            }
            tracing::info!(title, "round sheet is empty; filling it");
        } else {
            let sheet_id = self.log.add_sheet(&title).await?;
            tracing::debug!(title, sheet_id, "round sheet added");
        }
        self.log.append_rows(&title, round_rows(&round)).await?;
        tracing::info!(title, members = round.members.len(), "round recorded");
        Ok(())
    }
}

/// Appends one row per event envelope to the progress sheet.
pub struct ProgressHandler {
    log: Arc<dyn TabularLog>,
}

impl ProgressHandler {
    pub fn new(log: Arc<dyn TabularLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Handler for ProgressHandler {
    async fn handle(&self, message: &Message) -> Result<(), RecorderError> {
        let envelope: EventEnvelope = serde_json::from_slice(&message.payload)?;
        self.log
            .append_rows(PROGRESS_SHEET, vec![progress_row(&envelope)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::MemoryTabularLog;
    use cohort_core::entities::Member;
    use cohort_core::enums::Stage;
    use cohort_core::events::TOPIC_ROUND_CLOSED;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Memory log whose first `failures` appends fail.
    struct FailingAppends {
        inner: MemoryTabularLog,
        failures: AtomicU32,
    }

    #[async_trait]
    impl TabularLog for FailingAppends {
        async fn sheet_titles(&self) -> Result<Vec<String>, RecorderError> {
            self.inner.sheet_titles().await
        }

        async fn add_sheet(&self, title: &str) -> Result<u32, RecorderError> {
            self.inner.add_sheet(title).await
        }

        async fn row_count(&self, title: &str) -> Result<usize, RecorderError> {
            self.inner.row_count(title).await
        }

        async fn append_rows(&self, title: &str, rows: Vec<Row>) -> Result<(), RecorderError> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(RecorderError::Api {
                    status: 503,
                    message: "backend unavailable".into(),
                });
            }
            self.inner.append_rows(title, rows).await
        }
    }

    fn closed_message(guild: &str, number: u32, title: &str) -> Message {
        let mut round = Round::new(guild, number, title, ["A"]);
        round.stage = Stage::Finished;
        Message::new(TOPIC_ROUND_CLOSED, serde_json::to_vec(&round).unwrap())
    }

    #[tokio::test]
    async fn retry_fills_sheet_left_empty_by_failed_append() {
        let log = Arc::new(FailingAppends {
            inner: MemoryTabularLog::new(),
            failures: AtomicU32::new(1),
        });
        let handler = RoundClosedHandler::new(log.clone());
        let message = closed_message("G1", 1, "Rust");

        assert!(handler.handle(&message).await.is_err());
        assert_eq!(log.inner.row_count("1 라운드: Rust (G1)").await.unwrap(), 0);

        handler.handle(&message).await.unwrap();
        assert_eq!(log.inner.rows("1 라운드: Rust (G1)").await.unwrap().len(), 7);

        // A later redelivery leaves the filled sheet alone.
        handler.handle(&message).await.unwrap();
        assert_eq!(log.inner.rows("1 라운드: Rust (G1)").await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn same_round_number_in_two_guilds_gets_two_sheets() {
        let log = Arc::new(MemoryTabularLog::new());
        let handler = RoundClosedHandler::new(log.clone());

        handler.handle(&closed_message("G1", 1, "Rust")).await.unwrap();
        handler.handle(&closed_message("G2", 1, "Rust")).await.unwrap();

        assert_eq!(
            log.sheet_titles().await.unwrap(),
            vec!["1 라운드: Rust (G1)", "1 라운드: Rust (G2)"]
        );
        assert_eq!(log.rows("1 라운드: Rust (G2)").await.unwrap().len(), 7);
    }

    #[test]
    fn hyperlink_escapes_quotes() {
        assert_eq!(hyperlink(""), json!(""));
        assert_eq!(
            hyperlink("https://x/?q=\"a\""),
            json!("=HYPERLINK(\"https://x/?q=\"\"a\"\"\",\"https://x/?q=\"\"a\"\"\")")
        );
    }

    #[test]
    fn round_rows_layout() {
        let mut round = Round::new("G1", 3, "Rust", ["B", "A"]);
        round.stage = Stage::Finished;
        let mut alice = Member::default();
        alice.set_name("Alice");
        alice.set_subject("Traits");
        alice.set_content_url("https://slides");
        alice.set_registered(true);
        alice.set_attended(true);
        round.set_member("A", alice);

        let rows = round_rows(&round);
        assert_eq!(round_sheet_title(&round), "3 라운드: Rust (G1)");
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0], vec![json!("제목"), json!("Rust")]);
        assert_eq!(rows[1], vec![json!("단계"), json!(Stage::Finished.label())]);
        assert_eq!(rows[2], vec![json!("녹화 링크"), json!("")]);
        assert_eq!(
            rows[6],
            vec![
                json!("A"),
                json!("Alice"),
                json!("Traits"),
                hyperlink("https://slides"),
                json!(true),
            ]
        );
        assert_eq!(rows[7][0], json!("B"));
        assert_eq!(rows[7][4], json!(false));
    }

    #[test]
    fn progress_row_formats_timestamp() {
        let envelope = EventEnvelope {
            topic: "study.round-progress".into(),
            description: "moved".into(),
            timestamp: 1_767_225_600,
            data: None,
        };
        assert_eq!(
            progress_row(&envelope),
            vec![
                json!("study.round-progress"),
                json!("moved"),
                json!("2026-01-01T00:00:00Z"),
            ]
        );
    }
}
