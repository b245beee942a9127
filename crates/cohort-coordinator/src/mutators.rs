//! In-memory mutations applied after validation.
//!
//! Round mutators receive the study and the ongoing round slot. A mutator that
//! fills the slot with a round whose `id` is empty asks the pipeline to create
//! that round and link it as the ongoing one.

use cohort_core::entities::{Member, Round, Study};
use cohort_core::enums::Stage;
use cohort_core::errors::RoundError;

use crate::params::{UpdateParams, require};

pub type RoundMutator = fn(&mut Study, &mut Option<Round>, &UpdateParams) -> Result<(), RoundError>;

pub type StudyMutator = fn(&mut Study, &UpdateParams) -> Result<(), RoundError>;

fn with_member(
    round: &mut Option<Round>,
    member_id: &str,
    f: impl FnOnce(&mut Member),
) -> Result<(), RoundError> {
    let round = round.as_mut().ok_or(RoundError::RoundNotFound)?;
    let member = round
        .members
        .get_mut(member_id)
        .ok_or_else(|| RoundError::MemberNotFound {
            member_id: member_id.to_string(),
        })?;
    f(member);
    Ok(())
}

/// Advance the ongoing round by one stage.
///
/// Reaching `Finished` freezes the round and returns the study to `Wait`
/// with no ongoing round.
pub fn move_stage(
    study: &mut Study,
    round: &mut Option<Round>,
    _params: &UpdateParams,
) -> Result<(), RoundError> {
    let round = round.as_mut().ok_or(RoundError::RoundNotFound)?;
    let current = study.current_stage;
    let next = current.next();
    if !current.can_move_to(next) {
        return Err(RoundError::InvalidStage { stage: current });
    }

    if next == Stage::Finished {
        study.current_stage = Stage::Wait;
        study.ongoing_round_id.clear();
    } else {
        study.current_stage = next;
    }
    round.set_stage(next);
    Ok(())
}

/// Start a new round numbered after the previous one, open for registration.
pub fn new_study_round(
    study: &mut Study,
    round: &mut Option<Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    let title = require("title", &params.title)?;
    study.total_round += 1;
    study.current_stage = Stage::RegistrationOpened;

    let mut created = Round::new(
        study.guild_id.clone(),
        study.total_round,
        title,
        params.member_ids.iter().map(String::as_str),
    );
    created.set_stage(Stage::RegistrationOpened);
    *round = Some(created);
    Ok(())
}

pub fn register_member(
    _study: &mut Study,
    round: &mut Option<Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    let member_id = require("member_id", &params.member_id)?;
    let round = round.as_mut().ok_or(RoundError::RoundNotFound)?;
    let mut member = round.get_member(member_id).cloned().unwrap_or_default();
    member.set_name(params.member_name.as_str());
    member.set_subject(params.subject.as_str());
    member.set_registered(true);
    round.set_member(member_id, member);
    Ok(())
}

/// Withdraw a registration. Content, attendance and reviewers are kept.
pub fn unregister_speaker(
    _study: &mut Study,
    round: &mut Option<Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    with_member(round, &params.member_id, |member| {
        member.set_name("");
        member.set_subject("");
        member.set_registered(false);
    })
}

pub fn submit_member_content(
    _study: &mut Study,
    round: &mut Option<Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    with_member(round, &params.member_id, |member| {
        member.set_content_url(params.content_url.as_str());
    })
}

pub fn check_speaker_attendance(
    _study: &mut Study,
    round: &mut Option<Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    with_member(round, &params.member_id, |member| member.set_attended(true))
}

/// Record the session recording url on the round.
pub fn submit_round_content(
    _study: &mut Study,
    round: &mut Option<Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    let round = round.as_mut().ok_or(RoundError::RoundNotFound)?;
    round.set_content_url(params.content_url.as_str());
    Ok(())
}

pub fn set_reviewer(
    _study: &mut Study,
    round: &mut Option<Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    let reviewer_id = params.reviewer_id.clone();
    with_member(round, &params.reviewee_id, |member| {
        member.add_reviewer(reviewer_id);
    })
}

pub fn set_sent_reflection(
    _study: &mut Study,
    round: &mut Option<Round>,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    with_member(round, &params.member_id, |member| member.set_sent_reflection(true))
}

pub fn update_notice_channel_id(study: &mut Study, params: &UpdateParams) -> Result<(), RoundError> {
    study.notice_channel_id = require("channel_id", &params.channel_id)?.to_string();
    Ok(())
}

pub fn update_reflection_channel_id(
    study: &mut Study,
    params: &UpdateParams,
) -> Result<(), RoundError> {
    study.reflection_channel_id = require("channel_id", &params.channel_id)?.to_string();
    Ok(())
}

pub fn update_manager_id(study: &mut Study, params: &UpdateParams) -> Result<(), RoundError> {
    study.manager_id = require("manager_id", &params.manager_id)?.to_string();
    Ok(())
}

pub fn set_spreadsheet_url(study: &mut Study, params: &UpdateParams) -> Result<(), RoundError> {
    study.spreadsheet_url = require("content_url", &params.content_url)?.to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ongoing(stage: Stage) -> (Study, Option<Round>) {
        let mut study = Study::new("G1", "M");
        study.current_stage = stage;
        study.ongoing_round_id = "r1".into();
        study.total_round = 1;
        let mut round = Round::new("G1", 1, "T1", ["M", "A", "B"]);
        round.id = "r1".into();
        round.stage = stage;
        (study, Some(round))
    }

    #[test]
    fn move_stage_advances_both_stages() {
        let (mut study, mut round) = ongoing(Stage::RegistrationOpened);
        move_stage(&mut study, &mut round, &UpdateParams::new("G1")).unwrap();
        assert_eq!(study.current_stage, Stage::RegistrationClosed);
        assert_eq!(round.unwrap().stage, Stage::RegistrationClosed);
        assert_eq!(study.ongoing_round_id, "r1");
    }

    #[test]
    fn move_stage_to_finished_resets_study() {
        let (mut study, mut round) = ongoing(Stage::ReviewClosed);
        move_stage(&mut study, &mut round, &UpdateParams::new("G1")).unwrap();
        assert_eq!(study.current_stage, Stage::Wait);
        assert!(study.ongoing_round_id.is_empty());
        assert_eq!(round.unwrap().stage, Stage::Finished);
    }

    #[test]
    fn move_stage_from_none_is_invalid() {
        let (mut study, mut round) = ongoing(Stage::None);
        assert_eq!(
            move_stage(&mut study, &mut round, &UpdateParams::new("G1")),
            Err(RoundError::InvalidStage { stage: Stage::None })
        );
    }

    #[test]
    fn new_study_round_numbers_and_opens_registration() {
        let mut study = Study::new("G1", "M");
        study.total_round = 2;
        let mut round = None;
        let params = UpdateParams::new("G1").with_round("T3", ["M", "A"]);

        new_study_round(&mut study, &mut round, &params).unwrap();

        let round = round.unwrap();
        assert!(round.id.is_empty());
        assert_eq!(round.number, 3);
        assert_eq!(round.title, "T3");
        assert_eq!(round.stage, Stage::RegistrationOpened);
        assert_eq!(round.member_ids().collect::<Vec<_>>(), vec!["A", "M"]);
        assert_eq!(study.total_round, 3);
        assert_eq!(study.current_stage, Stage::RegistrationOpened);
    }

    #[test]
    fn new_study_round_requires_title() {
        let mut study = Study::new("G1", "M");
        let mut round = None;
        assert!(matches!(
            new_study_round(&mut study, &mut round, &UpdateParams::new("G1")),
            Err(RoundError::InvalidUpdateParams(_))
        ));
        assert_eq!(study.total_round, 0);
    }

    #[test]
    fn register_then_unregister_keeps_progress() {
        let (mut study, mut round) = ongoing(Stage::RegistrationOpened);
        let params = UpdateParams::new("G1").with_member("A").with_profile("Alice", "X");
        register_member(&mut study, &mut round, &params).unwrap();
        check_speaker_attendance(&mut study, &mut round, &params).unwrap();
        unregister_speaker(&mut study, &mut round, &params).unwrap();

        let member = round.unwrap().get_member("A").cloned().unwrap();
        assert!(!member.registered);
        assert_eq!(member.name, "");
        assert_eq!(member.subject, "");
        assert!(member.attended);
    }

    #[test]
    fn register_upserts_unknown_member() {
        let (mut study, mut round) = ongoing(Stage::RegistrationOpened);
        let params = UpdateParams::new("G1").with_member("Z").with_profile("Zed", "Y");
        register_member(&mut study, &mut round, &params).unwrap();
        assert!(round.unwrap().get_member("Z").unwrap().registered);
    }

    #[test]
    fn member_mutators_reject_unknown_members() {
        let (mut study, mut round) = ongoing(Stage::SubmissionOpened);
        let params = UpdateParams::new("G1").with_member("Z").with_content_url("http://x");
        assert_eq!(
            submit_member_content(&mut study, &mut round, &params),
            Err(RoundError::MemberNotFound { member_id: "Z".into() })
        );
    }

    #[test]
    fn set_reviewer_records_reviewer_on_reviewee() {
        let (mut study, mut round) = ongoing(Stage::ReviewOpened);
        let params = UpdateParams::new("G1").with_review("B", "A");
        set_reviewer(&mut study, &mut round, &params).unwrap();
        assert!(round.unwrap().get_member("A").unwrap().is_reviewer("B"));
    }

    #[test]
    fn study_setters() {
        let mut study = Study::new("G1", "M");
        update_notice_channel_id(&mut study, &UpdateParams::new("G1").with_channel("C1")).unwrap();
        update_reflection_channel_id(&mut study, &UpdateParams::new("G1").with_channel("C2")).unwrap();
        update_manager_id(&mut study, &UpdateParams::new("G1").with_manager("N")).unwrap();
        set_spreadsheet_url(&mut study, &UpdateParams::new("G1").with_content_url("https://sheet"))
            .unwrap();

        assert_eq!(study.notice_channel_id, "C1");
        assert_eq!(study.reflection_channel_id, "C2");
        assert_eq!(study.manager_id, "N");
        assert_eq!(study.spreadsheet_url, "https://sheet");
        assert!(matches!(
            update_notice_channel_id(&mut study, &UpdateParams::new("G1")),
            Err(RoundError::InvalidUpdateParams(_))
        ));
    }
}
