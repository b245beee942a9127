//! Domain error taxonomy for Cohort.
//!
//! Every kind is surfaced distinctly to the chat adapter, which renders its own
//! message. Infrastructure errors (`DatabaseError`, `BusError`, ...) are
//! defined in their respective crates and converge in `cohort-coordinator`.

use thiserror::Error;

use crate::enums::Stage;

/// Rejections raised by validators, mutators and event dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoundError {
    /// No study exists for the guild.
    #[error("Study not found for guild {guild_id}")]
    StudyNotFound { guild_id: String },

    /// No active round, or the requested round id does not exist.
    #[error("Round not found")]
    RoundNotFound,

    /// The actor is not the study manager.
    #[error("Actor {actor_id} is not the study manager")]
    NotManager { actor_id: String },

    /// The action is not allowed in the current stage.
    #[error("Action not allowed in stage {stage}")]
    InvalidStage { stage: Stage },

    /// A round is already in progress.
    #[error("A round is already in progress")]
    RoundAlreadySet,

    #[error("Member {member_id} is not part of the round")]
    MemberNotFound { member_id: String },

    #[error("Member {member_id} is not registered")]
    MemberNotRegistered { member_id: String },

    #[error("Member {member_id} did not attend")]
    MemberNotAttended { member_id: String },

    #[error("Member {member_id} is already registered")]
    AlreadyRegistered { member_id: String },

    #[error("Member {member_id} is already unregistered")]
    AlreadyUnregistered { member_id: String },

    #[error("Review from {reviewer_id} to {reviewee_id} was already sent")]
    AlreadySentReview {
        reviewer_id: String,
        reviewee_id: String,
    },

    #[error("Member {member_id} already sent a reflection")]
    AlreadySentReflection { member_id: String },

    /// Reviewer and reviewee are the same member.
    #[error("Cannot send feedback to yourself")]
    FeedbackYourself,

    /// A parameter required by the action is missing.
    #[error("Invalid update params: {0}")]
    InvalidUpdateParams(String),

    #[error("Unknown event topic: {0}")]
    UnknownEventTopic(String),

    /// A deadline was crossed before the operation completed.
    #[error("Operation timed out")]
    Timeout,
}

impl RoundError {
    /// Stable machine-readable kind, used in logs and CLI output.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StudyNotFound { .. } => "study_not_found",
            Self::RoundNotFound => "round_not_found",
            Self::NotManager { .. } => "not_manager",
            Self::InvalidStage { .. } => "invalid_stage",
            Self::RoundAlreadySet => "round_already_set",
            Self::MemberNotFound { .. } => "member_not_found",
            Self::MemberNotRegistered { .. } => "member_not_registered",
            Self::MemberNotAttended { .. } => "member_not_attended",
            Self::AlreadyRegistered { .. } => "already_registered",
            Self::AlreadyUnregistered { .. } => "already_unregistered",
            Self::AlreadySentReview { .. } => "already_sent_review",
            Self::AlreadySentReflection { .. } => "already_sent_reflection",
            Self::FeedbackYourself => "feedback_yourself",
            Self::InvalidUpdateParams(_) => "invalid_update_params",
            Self::UnknownEventTopic(_) => "unknown_event_topic",
            Self::Timeout => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = RoundError::InvalidStage {
            stage: Stage::SubmissionOpened,
        };
        assert_eq!(err.to_string(), "Action not allowed in stage submission_opened");
        assert_eq!(err.kind(), "invalid_stage");
    }
}
