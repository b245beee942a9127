use serde::{Deserialize, Serialize};

use cohort_core::errors::RoundError;

/// Inputs of a mutating command.
///
/// The superset of fields any command may reference. Each command reads only
/// the fields it needs; unused fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateParams {
    pub guild_id: String,
    /// Identity of the acting manager, or the new manager for `set-manager`.
    pub manager_id: String,
    pub channel_id: String,
    pub member_id: String,
    pub member_name: String,
    pub subject: String,
    pub content_url: String,
    pub reviewer_id: String,
    pub reviewee_id: String,
    pub title: String,
    pub member_ids: Vec<String>,
}

impl UpdateParams {
    #[must_use]
    pub fn new(guild_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_manager(mut self, manager_id: impl Into<String>) -> Self {
        self.manager_id = manager_id.into();
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = channel_id.into();
        self
    }

    #[must_use]
    pub fn with_member(mut self, member_id: impl Into<String>) -> Self {
        self.member_id = member_id.into();
        self
    }

    #[must_use]
    pub fn with_profile(mut self, name: impl Into<String>, subject: impl Into<String>) -> Self {
        self.member_name = name.into();
        self.subject = subject.into();
        self
    }

    #[must_use]
    pub fn with_content_url(mut self, url: impl Into<String>) -> Self {
        self.content_url = url.into();
        self
    }

    #[must_use]
    pub fn with_review(mut self, reviewer_id: impl Into<String>, reviewee_id: impl Into<String>) -> Self {
        self.reviewer_id = reviewer_id.into();
        self.reviewee_id = reviewee_id.into();
        self
    }

    #[must_use]
    pub fn with_round<I, S>(mut self, title: impl Into<String>, member_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.title = title.into();
        self.member_ids = member_ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Return `value`, or `InvalidUpdateParams` naming `field` when it is empty.
pub(crate) fn require<'a>(field: &str, value: &'a str) -> Result<&'a str, RoundError> {
    if value.trim().is_empty() {
        return Err(RoundError::InvalidUpdateParams(format!("{field} is required")));
    }
    Ok(value)
}
