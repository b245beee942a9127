//! Declarative command registry.
//!
//! The chat adapter normalizes every interaction to a command name and
//! [`UpdateParams`]; [`Coordinator::execute`] looks the name up here and runs
//! the matching pipeline.

use serde::Serialize;

use cohort_core::entities::{Round, Study};

use crate::error::CoordinatorError;
use crate::mutators::{self, RoundMutator, StudyMutator};
use crate::params::UpdateParams;
use crate::service::Coordinator;
use crate::validators::{self as v, Validator};

/// Which pipeline a command runs.
#[derive(Clone, Copy)]
pub enum Action {
    Round(RoundMutator),
    Study(StudyMutator),
}

/// One registry entry.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Whether the actor must be the study manager.
    pub manager_only: bool,
    /// Whether the caller must hold guild-admin rights, which only the chat
    /// adapter can verify.
    pub admin_only: bool,
    pub validators: &'static [Validator],
    pub action: Action,
}

pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "create-study-round",
        manager_only: true,
        admin_only: false,
        validators: &[v::validate_to_check_manager, v::validate_to_check_no_ongoing_round],
        action: Action::Round(mutators::new_study_round),
    },
    CommandSpec {
        name: "move-round-stage",
        manager_only: true,
        admin_only: false,
        validators: &[v::validate_to_check_manager, v::validate_to_check_ongoing_round],
        action: Action::Round(mutators::move_stage),
    },
    CommandSpec {
        name: "confirm-attendance",
        manager_only: true,
        admin_only: false,
        validators: &[
            v::validate_to_check_manager,
            v::validate_to_check_ongoing_round,
            v::validate_to_check_attendance,
        ],
        action: Action::Round(mutators::check_speaker_attendance),
    },
    CommandSpec {
        name: "register-recorded-content",
        manager_only: true,
        admin_only: false,
        validators: &[
            v::validate_to_check_manager,
            v::validate_to_check_ongoing_round,
            v::validate_to_submit_round_content,
        ],
        action: Action::Round(mutators::submit_round_content),
    },
    CommandSpec {
        name: "set-notice-channel",
        manager_only: true,
        admin_only: false,
        validators: &[v::validate_to_check_manager],
        action: Action::Study(mutators::update_notice_channel_id),
    },
    CommandSpec {
        name: "set-reflection-channel",
        manager_only: true,
        admin_only: false,
        validators: &[v::validate_to_check_manager],
        action: Action::Study(mutators::update_reflection_channel_id),
    },
    CommandSpec {
        name: "set-spreadsheet",
        manager_only: true,
        admin_only: false,
        validators: &[v::validate_to_check_manager],
        action: Action::Study(mutators::set_spreadsheet_url),
    },
    CommandSpec {
        name: "set-manager",
        manager_only: false,
        admin_only: true,
        validators: &[],
        action: Action::Study(mutators::update_manager_id),
    },
    CommandSpec {
        name: "register",
        manager_only: false,
        admin_only: false,
        validators: &[v::validate_to_check_ongoing_round, v::validate_to_register],
        action: Action::Round(mutators::register_member),
    },
    CommandSpec {
        name: "unregister",
        manager_only: false,
        admin_only: false,
        validators: &[v::validate_to_check_ongoing_round, v::validate_to_unregister],
        action: Action::Round(mutators::unregister_speaker),
    },
    CommandSpec {
        name: "submit-content",
        manager_only: false,
        admin_only: false,
        validators: &[
            v::validate_to_check_ongoing_round,
            v::validate_to_submit_member_content,
        ],
        action: Action::Round(mutators::submit_member_content),
    },
    CommandSpec {
        name: "feedback",
        manager_only: false,
        admin_only: false,
        validators: &[v::validate_to_set_reviewer],
        action: Action::Round(mutators::set_reviewer),
    },
    CommandSpec {
        name: "reflection",
        manager_only: false,
        admin_only: false,
        validators: &[
            v::validate_to_check_ongoing_round,
            v::validate_to_set_sent_reflection,
        ],
        action: Action::Round(mutators::set_sent_reflection),
    },
];

#[must_use]
pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|command| command.name == name)
}

/// Result of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutcome {
    Round { study: Study, round: Round },
    Study { study: Study },
}

impl Coordinator {
    /// Dispatch `command` through the registry.
    ///
    /// # Errors
    ///
    /// `UnknownCommand` for names not in [`COMMANDS`], otherwise the error of
    /// the pipeline.
    pub async fn execute(
        &self,
        command: &str,
        params: &UpdateParams,
    ) -> Result<CommandOutcome, CoordinatorError> {
        let spec = find_command(command)
            .ok_or_else(|| CoordinatorError::UnknownCommand(command.to_string()))?;
        tracing::debug!(command, guild_id = %params.guild_id, "executing command");

        match spec.action {
            Action::Round(mutator) => {
                let (study, round) = self.update_round(params, mutator, spec.validators).await?;
                Ok(CommandOutcome::Round { study, round })
            }
            Action::Study(mutator) => {
                let study = self.update_study(params, mutator, spec.validators).await?;
                Ok(CommandOutcome::Study { study })
            }
        }
    }
}
