//! Read-side commands and `setup`.

use serde::Serialize;

use cohort_coordinator::{COMMANDS, CoordinatorError};
use cohort_core::entities::{Member, Round, Study};
use cohort_core::errors::RoundError;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::{GuildArgs, MemberArgs, SetupArgs};
use crate::commands::command_error;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub study: Study,
    pub round: Option<Round>,
}

#[derive(Debug, Serialize)]
pub struct SpeakerRow {
    pub member_id: String,
    #[serde(flatten)]
    pub member: Member,
}

#[derive(Debug, Serialize)]
pub struct CommandRow {
    pub name: &'static str,
    pub manager_only: bool,
    pub admin_only: bool,
}

pub async fn setup(args: &SetupArgs, ctx: &AppContext) -> anyhow::Result<Study> {
    let study = ctx
        .coordinator
        .setup_study(&args.guild, &args.manager)
        .await
        .map_err(command_error)?;
    tracing::info!(guild_id = %study.guild_id, "study ready");
    Ok(study)
}

pub async fn status(args: &GuildArgs, ctx: &AppContext) -> anyhow::Result<StatusResponse> {
    let study = ctx
        .coordinator
        .get_study(&args.guild)
        .await
        .map_err(command_error)?;
    let round = match ctx.coordinator.get_ongoing_round(&args.guild).await {
        Ok(round) => Some(round),
        Err(error) if is_round_not_found(&error) => None,
        Err(error) => return Err(command_error(error)),
    };
    Ok(StatusResponse { study, round })
}

fn is_round_not_found(error: &CoordinatorError) -> bool {
    matches!(error.as_round_error(), Some(RoundError::RoundNotFound))
}

pub async fn rounds(args: &GuildArgs, ctx: &AppContext) -> anyhow::Result<Vec<Round>> {
    ctx.coordinator
        .get_rounds(&args.guild)
        .await
        .map_err(command_error)
}

pub async fn speakers(args: &GuildArgs, ctx: &AppContext) -> anyhow::Result<Vec<SpeakerRow>> {
    let speakers = ctx
        .coordinator
        .get_speakers(&args.guild)
        .await
        .map_err(command_error)?;
    Ok(speakers
        .into_iter()
        .map(|(member_id, member)| SpeakerRow { member_id, member })
        .collect())
}

pub async fn member(args: &MemberArgs, ctx: &AppContext) -> anyhow::Result<Member> {
    ctx.coordinator
        .get_member(&args.guild, &args.member)
        .await
        .map_err(command_error)
}

#[must_use]
pub fn list_commands() -> Vec<CommandRow> {
    COMMANDS
        .iter()
        .map(|command| CommandRow {
            name: command.name,
            manager_only: command.manager_only,
            admin_only: command.admin_only,
        })
        .collect()
}

pub async fn handle_setup(
    args: &SetupArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    output(&setup(args, ctx).await?, flags.format)
}

pub async fn handle_status(
    args: &GuildArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    output(&status(args, ctx).await?, flags.format)
}

pub async fn handle_rounds(
    args: &GuildArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    output(&rounds(args, ctx).await?, flags.format)
}

pub async fn handle_speakers(
    args: &GuildArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    output(&speakers(args, ctx).await?, flags.format)
}

pub async fn handle_member(
    args: &MemberArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    output(&member(args, ctx).await?, flags.format)
}

pub fn handle_commands(flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&list_commands(), flags.format)
}
