use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Stage;

/// Per-guild coordinator aggregate. Lives forever once created.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Study {
    pub id: String,
    pub guild_id: String,
    pub notice_channel_id: String,
    pub reflection_channel_id: String,
    pub manager_id: String,
    /// Empty when no round is in progress.
    pub ongoing_round_id: String,
    pub spreadsheet_url: String,
    pub current_stage: Stage,
    pub total_round: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Study {
    /// A study for `guild_id` that has not been persisted yet (empty `id`).
    #[must_use]
    pub fn new(guild_id: impl Into<String>, manager_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            guild_id: guild_id.into(),
            notice_channel_id: String::new(),
            reflection_channel_id: String::new(),
            manager_id: manager_id.into(),
            ongoing_round_id: String::new(),
            spreadsheet_url: String::new(),
            current_stage: Stage::Wait,
            total_round: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn has_ongoing_round(&self) -> bool {
        !self.ongoing_round_id.is_empty()
    }

    #[must_use]
    pub fn is_manager(&self, actor_id: &str) -> bool {
        !self.manager_id.is_empty() && self.manager_id == actor_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_study_waits_without_round() {
        let study = Study::new("G1", "M");
        assert!(study.id.is_empty());
        assert_eq!(study.current_stage, Stage::Wait);
        assert!(!study.has_ongoing_round());
        assert_eq!(study.total_round, 0);
        assert_eq!(study.created_at, study.updated_at);
    }

    #[test]
    fn empty_manager_never_matches() {
        let study = Study::new("G1", "");
        assert!(!study.is_manager(""));
        assert!(Study::new("G1", "M").is_manager("M"));
    }
}
