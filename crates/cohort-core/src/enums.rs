//! Stage enum and its state machine.
//!
//! Stages use `snake_case` serialization via `#[serde(rename_all = "snake_case")]`,
//! which is also the representation stored in SQL and in cached rounds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Position of a study round in its lifecycle.
///
/// Variants are declared in lifecycle order, so the derived `Ord` is the
/// total order of stages.
///
/// ```text
/// wait → registration_opened → registration_closed
///      → submission_opened → submission_closed
///      → presentation_started → presentation_finished
///      → review_opened → review_closed → finished → none
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    None,
    Wait,
    RegistrationOpened,
    RegistrationClosed,
    SubmissionOpened,
    SubmissionClosed,
    PresentationStarted,
    PresentationFinished,
    ReviewOpened,
    ReviewClosed,
    Finished,
}

impl Stage {
    /// All stages in lifecycle order.
    pub const ALL: [Self; 11] = [
        Self::None,
        Self::Wait,
        Self::RegistrationOpened,
        Self::RegistrationClosed,
        Self::SubmissionOpened,
        Self::SubmissionClosed,
        Self::PresentationStarted,
        Self::PresentationFinished,
        Self::ReviewOpened,
        Self::ReviewClosed,
        Self::Finished,
    ];

    /// The single stage that may follow this one.
    ///
    /// `None` is terminal and maps to itself.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::None | Self::Finished => Self::None,
            Self::Wait => Self::RegistrationOpened,
            Self::RegistrationOpened => Self::RegistrationClosed,
            Self::RegistrationClosed => Self::SubmissionOpened,
            Self::SubmissionOpened => Self::SubmissionClosed,
            Self::SubmissionClosed => Self::PresentationStarted,
            Self::PresentationStarted => Self::PresentationFinished,
            Self::PresentationFinished => Self::ReviewOpened,
            Self::ReviewOpened => Self::ReviewClosed,
            Self::ReviewClosed => Self::Finished,
        }
    }

    /// Check whether moving to `next` is allowed.
    #[must_use]
    pub fn can_move_to(self, next: Self) -> bool {
        self != Self::None && next == self.next()
    }

    /// Whether a round in this stage is still in progress.
    #[must_use]
    pub const fn is_ongoing(self) -> bool {
        !matches!(self, Self::None | Self::Wait | Self::Finished)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Wait => "wait",
            Self::RegistrationOpened => "registration_opened",
            Self::RegistrationClosed => "registration_closed",
            Self::SubmissionOpened => "submission_opened",
            Self::SubmissionClosed => "submission_closed",
            Self::PresentationStarted => "presentation_started",
            Self::PresentationFinished => "presentation_finished",
            Self::ReviewOpened => "review_opened",
            Self::ReviewClosed => "review_closed",
            Self::Finished => "finished",
        }
    }

    /// Human-readable label shown in chat and in the tabular log.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "없음",
            Self::Wait => "대기",
            Self::RegistrationOpened => "발표자 등록 중",
            Self::RegistrationClosed => "발표자 등록 마감",
            Self::SubmissionOpened => "발표 자료 제출 중",
            Self::SubmissionClosed => "발표 자료 제출 마감",
            Self::PresentationStarted => "발표 진행 중",
            Self::PresentationFinished => "발표 종료",
            Self::ReviewOpened => "피드백 진행 중",
            Self::ReviewClosed => "피드백 마감",
            Self::Finished => "라운드 종료",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn next_walks_the_full_lifecycle_from_wait() {
        let mut stage = Stage::Wait;
        let mut seen = Vec::new();
        while stage != Stage::None {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::RegistrationOpened,
                Stage::RegistrationClosed,
                Stage::SubmissionOpened,
                Stage::SubmissionClosed,
                Stage::PresentationStarted,
                Stage::PresentationFinished,
                Stage::ReviewOpened,
                Stage::ReviewClosed,
                Stage::Finished,
                Stage::None,
            ]
        );
    }

    #[test]
    fn declaration_order_is_lifecycle_order() {
        for pair in Stage::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} should precede {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn none_is_terminal() {
        assert_eq!(Stage::None.next(), Stage::None);
        for stage in Stage::ALL {
            assert!(!Stage::None.can_move_to(stage));
        }
    }

    #[rstest]
    #[case(Stage::Wait, Stage::RegistrationOpened, true)]
    #[case(Stage::RegistrationOpened, Stage::RegistrationClosed, true)]
    #[case(Stage::ReviewClosed, Stage::Finished, true)]
    #[case(Stage::RegistrationOpened, Stage::SubmissionOpened, false)]
    #[case(Stage::SubmissionOpened, Stage::RegistrationOpened, false)]
    #[case(Stage::ReviewOpened, Stage::ReviewOpened, false)]
    fn can_move_to_only_accepts_successor(
        #[case] from: Stage,
        #[case] to: Stage,
        #[case] expected: bool,
    ) {
        assert_eq!(from.can_move_to(to), expected);
    }

    #[test]
    fn ongoing_excludes_idle_and_finished() {
        assert!(!Stage::None.is_ongoing());
        assert!(!Stage::Wait.is_ongoing());
        assert!(!Stage::Finished.is_ongoing());
        assert!(Stage::RegistrationOpened.is_ongoing());
        assert!(Stage::ReviewClosed.is_ongoing());
    }

    #[test]
    fn serde_matches_as_str() {
        for stage in Stage::ALL {
            let json = serde_json::to_value(stage).unwrap();
            assert_eq!(json, serde_json::Value::String(stage.as_str().to_string()));
        }
    }
}
