use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Member;
use crate::enums::Stage;

/// One numbered cycle of the stage machine for a guild.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Round {
    pub id: String,
    pub guild_id: String,
    pub number: u32,
    pub title: String,
    /// Recording of the presentation session, set by the manager.
    pub content_url: String,
    pub stage: Stage,
    pub members: BTreeMap<String, Member>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Round {
    /// A round that has not been persisted yet (empty `id`), with an empty
    /// `Member` for every id in `member_ids`.
    #[must_use]
    pub fn new<I, S>(
        guild_id: impl Into<String>,
        number: u32,
        title: impl Into<String>,
        member_ids: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Utc::now();
        Self {
            id: String::new(),
            guild_id: guild_id.into(),
            number,
            title: title.into(),
            content_url: String::new(),
            stage: Stage::None,
            members: member_ids
                .into_iter()
                .map(|id| (id.into(), Member::default()))
                .collect(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn get_member(&self, member_id: &str) -> Option<&Member> {
        self.members.get(member_id)
    }

    pub fn set_member(&mut self, member_id: impl Into<String>, member: Member) {
        self.members.insert(member_id.into(), member);
    }

    pub const fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
    }

    pub fn set_content_url(&mut self, url: impl Into<String>) {
        self.content_url = url.into();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub const fn set_number(&mut self, number: u32) {
        self.number = number;
    }

    /// Registered members, in member id order.
    pub fn speakers(&self) -> impl Iterator<Item = (&String, &Member)> {
        self.members.iter().filter(|(_, member)| member.registered)
    }

    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }
}
