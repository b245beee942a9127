use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A participant of a round, keyed by external user id inside `Round::members`.
///
/// `reviewers` holds the ids of members who sent feedback *to* this member.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Member {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub content_url: String,
    #[serde(default)]
    pub registered: bool,
    #[serde(default)]
    pub attended: bool,
    #[serde(default)]
    pub sent_reflection: bool,
    #[serde(default)]
    pub reviewers: BTreeSet<String>,
}

impl Member {
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_subject(&mut self, subject: impl Into<String>) {
        self.subject = subject.into();
    }

    pub fn set_content_url(&mut self, url: impl Into<String>) {
        self.content_url = url.into();
    }

    pub const fn set_registered(&mut self, registered: bool) {
        self.registered = registered;
    }

    pub const fn set_attended(&mut self, attended: bool) {
        self.attended = attended;
    }

    pub const fn set_sent_reflection(&mut self, sent: bool) {
        self.sent_reflection = sent;
    }

    /// Record `reviewer_id` as having reviewed this member.
    ///
    /// Returns `false` when the reviewer was already recorded.
    pub fn add_reviewer(&mut self, reviewer_id: impl Into<String>) -> bool {
        self.reviewers.insert(reviewer_id.into())
    }

    #[must_use]
    pub fn is_reviewer(&self, reviewer_id: &str) -> bool {
        self.reviewers.contains(reviewer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_reviewer_is_set_like() {
        let mut member = Member::default();
        assert!(member.add_reviewer("B"));
        assert!(!member.add_reviewer("B"));
        assert!(member.is_reviewer("B"));
        assert!(!member.is_reviewer("C"));
        assert_eq!(member.reviewers.len(), 1);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let member: Member = serde_json::from_str(r#"{"name":"Alice"}"#).unwrap();
        assert_eq!(member.name, "Alice");
        assert!(!member.registered);
        assert!(member.reviewers.is_empty());
    }
}
