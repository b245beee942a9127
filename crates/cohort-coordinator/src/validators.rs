//! Preconditions checked inside the pipeline transaction, before mutation.
//!
//! Each validator sees the loaded study, the ongoing round (if any) and the
//! command params, and returns the first failing [`RoundError`]. Commands list
//! their validators cheapest first: authority, then existence, then state.

use cohort_core::entities::{Member, Round, Study};
use cohort_core::enums::Stage;
use cohort_core::errors::RoundError;

use crate::params::{UpdateParams, require};

/// A precondition on the loaded aggregates.
pub type Validator = fn(&Study, Option<&Round>, &UpdateParams) -> Result<(), RoundError>;

fn ongoing(round: Option<&Round>) -> Result<&Round, RoundError> {
    round.ok_or(RoundError::RoundNotFound)
}

fn require_stage(study: &Study, stage: Stage) -> Result<(), RoundError> {
    if study.current_stage == stage {
        Ok(())
    } else {
        Err(RoundError::InvalidStage {
            stage: study.current_stage,
        })
    }
}

/// The stage is `min` or later, and a round is still in progress.
fn require_stage_at_least(study: &Study, min: Stage) -> Result<(), RoundError> {
    if study.current_stage >= min && study.current_stage.is_ongoing() {
        Ok(())
    } else {
        Err(RoundError::InvalidStage {
            stage: study.current_stage,
        })
    }
}

fn registered_member<'a>(round: &'a Round, member_id: &str) -> Result<&'a Member, RoundError> {
    match round.get_member(member_id) {
        Some(member) if member.registered => Ok(member),
        _ => Err(RoundError::MemberNotRegistered {
            member_id: member_id.to_string(),
        }),
    }
}

pub fn validate_to_check_manager(
    study: &Study,
    _round: Option<&Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    if study.is_manager(&params.manager_id) {
        Ok(())
    } else {
        Err(RoundError::NotManager {
            actor_id: params.manager_id.clone(),
        })
    }
}

/// A round is in progress. A study still in `None` has never been set up for
/// rounds, which is a stage error rather than a missing round.
pub fn validate_to_check_ongoing_round(
    study: &Study,
    round: Option<&Round>,
    _params: &UpdateParams,
) -> Result<(), RoundError> {
    match study.current_stage {
        Stage::None => Err(RoundError::InvalidStage { stage: Stage::None }),
        Stage::Wait | Stage::Finished => Err(RoundError::RoundNotFound),
        _ => ongoing(round).map(|_| ()),
    }
}

pub fn validate_to_check_no_ongoing_round(
    study: &Study,
    _round: Option<&Round>,
    _params: &UpdateParams,
) -> Result<(), RoundError> {
    if study.current_stage.is_ongoing() {
        Err(RoundError::RoundAlreadySet)
    } else {
        Ok(())
    }
}

pub fn validate_to_register(
    study: &Study,
    round: Option<&Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    require_stage(study, Stage::RegistrationOpened)?;
    let round = ongoing(round)?;
    let member_id = require("member_id", &params.member_id)?;
    match round.get_member(member_id) {
        Some(member) if member.registered => Err(RoundError::AlreadyRegistered {
            member_id: member_id.to_string(),
        }),
        _ => Ok(()),
    }
}

pub fn validate_to_unregister(
    study: &Study,
    round: Option<&Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    require_stage(study, Stage::RegistrationOpened)?;
    let round = ongoing(round)?;
    let member_id = require("member_id", &params.member_id)?;
    match round.get_member(member_id) {
        Some(member) if member.registered => Ok(()),
        _ => Err(RoundError::AlreadyUnregistered {
            member_id: member_id.to_string(),
        }),
    }
}

pub fn validate_to_submit_member_content(
    study: &Study,
    round: Option<&Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    require_stage(study, Stage::SubmissionOpened)?;
    let round = ongoing(round)?;
    let member_id = require("member_id", &params.member_id)?;
    registered_member(round, member_id)?;
    require("content_url", &params.content_url)?;
    Ok(())
}

pub fn validate_to_check_attendance(
    study: &Study,
    round: Option<&Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    require_stage_at_least(study, Stage::PresentationStarted)?;
    let round = ongoing(round)?;
    let member_id = require("member_id", &params.member_id)?;
    registered_member(round, member_id)?;
    Ok(())
}

pub fn validate_to_submit_round_content(
    study: &Study,
    round: Option<&Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    require_stage_at_least(study, Stage::PresentationFinished)?;
    ongoing(round)?;
    require("content_url", &params.content_url)?;
    Ok(())
}

/// Self-review is rejected before anything else is looked at.
pub fn validate_to_set_reviewer(
    study: &Study,
    round: Option<&Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    if !params.reviewer_id.is_empty() && params.reviewer_id == params.reviewee_id {
        return Err(RoundError::FeedbackYourself);
    }
    let reviewer_id = require("reviewer_id", &params.reviewer_id)?;
    let reviewee_id = require("reviewee_id", &params.reviewee_id)?;
    require_stage(study, Stage::ReviewOpened)?;
    let round = ongoing(round)?;

    match round.get_member(reviewer_id) {
        None => {
            return Err(RoundError::MemberNotFound {
                member_id: reviewer_id.to_string(),
            });
        }
        Some(reviewer) if !reviewer.registered => {
            return Err(RoundError::MemberNotRegistered {
                member_id: reviewer_id.to_string(),
            });
        }
        Some(_) => {}
    }
    let Some(reviewee) = round.get_member(reviewee_id) else {
        return Err(RoundError::MemberNotFound {
            member_id: reviewee_id.to_string(),
        });
    };
    if !reviewee.registered {
        return Err(RoundError::MemberNotRegistered {
            member_id: reviewee_id.to_string(),
        });
    }
    if !reviewee.attended {
        return Err(RoundError::MemberNotAttended {
            member_id: reviewee_id.to_string(),
        });
    }
    if reviewee.is_reviewer(reviewer_id) {
        return Err(RoundError::AlreadySentReview {
            reviewer_id: reviewer_id.to_string(),
            reviewee_id: reviewee_id.to_string(),
        });
    }
    Ok(())
}

pub fn validate_to_set_sent_reflection(
    study: &Study,
    round: Option<&Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    require_stage_at_least(study, Stage::PresentationFinished)?;
    let round = ongoing(round)?;
    let member_id = require("member_id", &params.member_id)?;
    let member = registered_member(round, member_id)?;
    if !member.attended {
        return Err(RoundError::MemberNotAttended {
            member_id: member_id.to_string(),
        });
    }
    if member.sent_reflection {
        return Err(RoundError::AlreadySentReflection {
            member_id: member_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn study_at(stage: Stage) -> Study {
        let mut study = Study::new("G1", "M");
        study.current_stage = stage;
        if stage.is_ongoing() {
            study.ongoing_round_id = "r1".into();
        }
        study
    }

    /// Round with A registered and attended, B registered only, C unregistered.
    fn round_at(stage: Stage) -> Round {
        let mut round = Round::new("G1", 1, "T1", ["M", "A", "B", "C"]);
        round.id = "r1".into();
        round.stage = stage;
        let mut alice = Member::default();
        alice.set_registered(true);
        alice.set_attended(true);
        round.set_member("A", alice);
        let mut bob = Member::default();
        bob.set_registered(true);
        round.set_member("B", bob);
        round
    }

    fn check(validator: Validator, stage: Stage, params: &UpdateParams) -> Result<(), RoundError> {
        let round = round_at(stage);
        validator(&study_at(stage), Some(&round), params)
    }

    #[test]
    fn manager_check_compares_actor() {
        let study = study_at(Stage::Wait);
        assert!(validate_to_check_manager(&study, None, &UpdateParams::new("G1").with_manager("M")).is_ok());
        assert_eq!(
            validate_to_check_manager(&study, None, &UpdateParams::new("G1").with_manager("X")),
            Err(RoundError::NotManager { actor_id: "X".into() })
        );
    }

    #[rstest]
    #[case(Stage::None, Err(RoundError::InvalidStage { stage: Stage::None }))]
    #[case(Stage::Wait, Err(RoundError::RoundNotFound))]
    #[case(Stage::RegistrationOpened, Ok(()))]
    #[case(Stage::ReviewClosed, Ok(()))]
    fn ongoing_round_check(#[case] stage: Stage, #[case] expected: Result<(), RoundError>) {
        assert_eq!(
            check(validate_to_check_ongoing_round, stage, &UpdateParams::new("G1")),
            expected
        );
    }

    #[test]
    fn ongoing_round_check_requires_loaded_round() {
        let study = study_at(Stage::SubmissionOpened);
        assert_eq!(
            validate_to_check_ongoing_round(&study, None, &UpdateParams::new("G1")),
            Err(RoundError::RoundNotFound)
        );
    }

    #[rstest]
    #[case(Stage::None, true)]
    #[case(Stage::Wait, true)]
    #[case(Stage::RegistrationOpened, false)]
    #[case(Stage::PresentationStarted, false)]
    #[case(Stage::ReviewClosed, false)]
    fn no_ongoing_round_check(#[case] stage: Stage, #[case] allowed: bool) {
        let result = validate_to_check_no_ongoing_round(&study_at(stage), None, &UpdateParams::new("G1"));
        assert_eq!(result.is_ok(), allowed);
        if !allowed {
            assert_eq!(result, Err(RoundError::RoundAlreadySet));
        }
    }

    #[test]
    fn register_rules() {
        let params = |id: &str| UpdateParams::new("G1").with_member(id);
        assert!(check(validate_to_register, Stage::RegistrationOpened, &params("C")).is_ok());
        // Unknown members are upserted.
        assert!(check(validate_to_register, Stage::RegistrationOpened, &params("Z")).is_ok());
        assert_eq!(
            check(validate_to_register, Stage::RegistrationOpened, &params("A")),
            Err(RoundError::AlreadyRegistered { member_id: "A".into() })
        );
        assert!(matches!(
            check(validate_to_register, Stage::RegistrationOpened, &params("")),
            Err(RoundError::InvalidUpdateParams(_))
        ));
        assert_eq!(
            check(validate_to_register, Stage::RegistrationClosed, &params("C")),
            Err(RoundError::InvalidStage { stage: Stage::RegistrationClosed })
        );
    }

    #[test]
    fn unregister_rules() {
        let params = |id: &str| UpdateParams::new("G1").with_member(id);
        assert!(check(validate_to_unregister, Stage::RegistrationOpened, &params("B")).is_ok());
        assert_eq!(
            check(validate_to_unregister, Stage::RegistrationOpened, &params("C")),
            Err(RoundError::AlreadyUnregistered { member_id: "C".into() })
        );
        assert_eq!(
            check(validate_to_unregister, Stage::RegistrationOpened, &params("Z")),
            Err(RoundError::AlreadyUnregistered { member_id: "Z".into() })
        );
    }

    #[test]
    fn submit_member_content_rules() {
        let params = |id: &str| UpdateParams::new("G1").with_member(id).with_content_url("http://x");
        assert!(check(validate_to_submit_member_content, Stage::SubmissionOpened, &params("B")).is_ok());
        assert_eq!(
            check(validate_to_submit_member_content, Stage::SubmissionOpened, &params("C")),
            Err(RoundError::MemberNotRegistered { member_id: "C".into() })
        );
        assert_eq!(
            check(validate_to_submit_member_content, Stage::SubmissionClosed, &params("B")),
            Err(RoundError::InvalidStage { stage: Stage::SubmissionClosed })
        );
        assert!(matches!(
            check(
                validate_to_submit_member_content,
                Stage::SubmissionOpened,
                &UpdateParams::new("G1").with_member("B")
            ),
            Err(RoundError::InvalidUpdateParams(_))
        ));
    }

    #[rstest]
    #[case(Stage::PresentationStarted, true)]
    #[case(Stage::ReviewClosed, true)]
    #[case(Stage::SubmissionClosed, false)]
    fn attendance_requires_presentation(#[case] stage: Stage, #[case] allowed: bool) {
        let params = UpdateParams::new("G1").with_member("B");
        assert_eq!(check(validate_to_check_attendance, stage, &params).is_ok(), allowed);
    }

    #[test]
    fn round_content_requires_url() {
        let params = UpdateParams::new("G1").with_content_url("https://video");
        assert!(check(validate_to_submit_round_content, Stage::PresentationFinished, &params).is_ok());
        assert!(matches!(
            check(validate_to_submit_round_content, Stage::ReviewOpened, &UpdateParams::new("G1")),
            Err(RoundError::InvalidUpdateParams(_))
        ));
        assert_eq!(
            check(validate_to_submit_round_content, Stage::PresentationStarted, &params),
            Err(RoundError::InvalidStage { stage: Stage::PresentationStarted })
        );
    }

    #[rstest]
    #[case("B", "A", Ok(()))]
    #[case("A", "A", Err(RoundError::FeedbackYourself))]
    #[case("Z", "A", Err(RoundError::MemberNotFound { member_id: "Z".into() }))]
    #[case("A", "Z", Err(RoundError::MemberNotFound { member_id: "Z".into() }))]
    #[case("A", "C", Err(RoundError::MemberNotRegistered { member_id: "C".into() }))]
    #[case("C", "A", Err(RoundError::MemberNotRegistered { member_id: "C".into() }))]
    #[case("A", "B", Err(RoundError::MemberNotAttended { member_id: "B".into() }))]
    fn set_reviewer_rules(
        #[case] reviewer: &str,
        #[case] reviewee: &str,
        #[case] expected: Result<(), RoundError>,
    ) {
        let params = UpdateParams::new("G1").with_review(reviewer, reviewee);
        assert_eq!(check(validate_to_set_reviewer, Stage::ReviewOpened, &params), expected);
    }

    #[test]
    fn self_review_is_caught_before_stage() {
        let params = UpdateParams::new("G1").with_review("A", "A");
        assert_eq!(
            check(validate_to_set_reviewer, Stage::RegistrationOpened, &params),
            Err(RoundError::FeedbackYourself)
        );
    }

    #[test]
    fn duplicate_review_is_rejected() {
        let mut round = round_at(Stage::ReviewOpened);
        let mut alice = round.get_member("A").cloned().unwrap();
        alice.add_reviewer("B");
        round.set_member("A", alice);

        let params = UpdateParams::new("G1").with_review("B", "A");
        assert_eq!(
            validate_to_set_reviewer(&study_at(Stage::ReviewOpened), Some(&round), &params),
            Err(RoundError::AlreadySentReview {
                reviewer_id: "B".into(),
                reviewee_id: "A".into(),
            })
        );
    }

    #[test]
    fn reflection_rules() {
        let params = |id: &str| UpdateParams::new("G1").with_member(id);
        assert!(check(validate_to_set_sent_reflection, Stage::ReviewOpened, &params("A")).is_ok());
        assert_eq!(
            check(validate_to_set_sent_reflection, Stage::ReviewOpened, &params("B")),
            Err(RoundError::MemberNotAttended { member_id: "B".into() })
        );
        assert_eq!(
            check(validate_to_set_sent_reflection, Stage::ReviewOpened, &params("C")),
            Err(RoundError::MemberNotRegistered { member_id: "C".into() })
        );

        let mut round = round_at(Stage::ReviewOpened);
        let mut alice = round.get_member("A").cloned().unwrap();
        alice.set_sent_reflection(true);
        round.set_member("A", alice);
        assert_eq!(
            validate_to_set_sent_reflection(&study_at(Stage::ReviewOpened), Some(&round), &params("A")),
            Err(RoundError::AlreadySentReflection { member_id: "A".into() })
        );
    }
}
