use cohort_coordinator::{CommandOutcome, UpdateParams, find_command};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::ExecArgs;
use crate::commands::command_error;
use crate::context::AppContext;
use crate::output::output;

/// Run one registry command and wait for its post-commit work, so events
/// leave the process before it exits.
///
/// Commands gated on guild-admin rights are refused: the CLI has no way to
/// check them.
pub async fn exec(args: &ExecArgs, ctx: &AppContext) -> anyhow::Result<CommandOutcome> {
    if find_command(&args.command).is_some_and(|spec| spec.admin_only) {
        anyhow::bail!(
            "permission_denied: '{}' needs guild-admin rights and must come from the chat adapter",
            args.command
        );
    }
    let params = UpdateParams::from(args.params.clone());
    let result = ctx.coordinator.execute(&args.command, &params).await;

    if !ctx
        .coordinator
        .flush(ctx.config.coordinator.publish_timeout())
        .await
    {
        tracing::warn!(command = %args.command, "exiting before all events were published");
    }
    result.map_err(command_error)
}

pub async fn handle(args: &ExecArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    output(&exec(args, ctx).await?, flags.format)
}

#[cfg(test)]
pub(crate) mod tests {
    use cohort_config::{CohortConfig, DatabaseConfig};
    use cohort_core::enums::Stage;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cli::root_commands::{GuildArgs, ParamsArgs, SetupArgs};
    use crate::commands::study;

    pub(crate) async fn memory_context() -> AppContext {
        let config = CohortConfig {
            database: DatabaseConfig {
                path: ":memory:".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        AppContext::init(config).await.unwrap()
    }

    fn exec_args(command: &str, params: ParamsArgs) -> ExecArgs {
        ExecArgs {
            command: command.to_string(),
            params,
        }
    }

    async fn setup(ctx: &AppContext) {
        study::setup(
            &SetupArgs {
                guild: "G1".into(),
                manager: "M".into(),
            },
            ctx,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn exec_drives_a_round() {
        let ctx = memory_context().await;
        setup(&ctx).await;

        let outcome = exec(
            &exec_args(
                "create-study-round",
                ParamsArgs {
                    guild: "G1".into(),
                    manager: "M".into(),
                    title: "Async".into(),
                    members: vec!["A".into(), "B".into()],
                    ..Default::default()
                },
            ),
            &ctx,
        )
        .await
        .unwrap();
        let CommandOutcome::Round { study, round } = outcome else {
            panic!("expected a round outcome");
        };
        assert_eq!(study.ongoing_round_id, round.id);
        assert_eq!(round.stage, Stage::RegistrationOpened);

        exec(
            &exec_args(
                "register",
                ParamsArgs {
                    guild: "G1".into(),
                    member: "A".into(),
                    name: "Alice".into(),
                    subject: "Pinning".into(),
                    ..Default::default()
                },
            ),
            &ctx,
        )
        .await
        .unwrap();

        let guild = GuildArgs {
            guild: "G1".into(),
        };
        let status = study::status(&guild, &ctx).await.unwrap();
        assert_eq!(status.round.map(|round| round.title), Some("Async".to_string()));
        let speakers = study::speakers(&guild, &ctx).await.unwrap();
        assert_eq!(speakers.len(), 1);
        assert_eq!(speakers[0].member_id, "A");
        assert_eq!(speakers[0].member.name, "Alice");
    }

    #[tokio::test]
    async fn exec_reports_error_kinds() {
        let ctx = memory_context().await;
        setup(&ctx).await;

        let error = exec(
            &exec_args(
                "move-round-stage",
                ParamsArgs {
                    guild: "G1".into(),
                    manager: "someone-else".into(),
                    ..Default::default()
                },
            ),
            &ctx,
        )
        .await
        .unwrap_err();
        assert!(format!("{error:#}").starts_with("not_manager: "), "{error:#}");

        let error = exec(
            &exec_args(
                "dance",
                ParamsArgs {
                    guild: "G1".into(),
                    ..Default::default()
                },
            ),
            &ctx,
        )
        .await
        .unwrap_err();
        assert!(format!("{error:#}").starts_with("unknown_command: "), "{error:#}");
    }

    #[tokio::test]
    async fn exec_refuses_admin_commands() {
        let ctx = memory_context().await;
        setup(&ctx).await;

        let error = exec(
            &exec_args(
                "set-manager",
                ParamsArgs {
                    guild: "G1".into(),
                    manager: "intruder".into(),
                    ..Default::default()
                },
            ),
            &ctx,
        )
        .await
        .unwrap_err();
        assert!(format!("{error:#}").starts_with("permission_denied: "), "{error:#}");

        let status = study::status(
            &GuildArgs {
                guild: "G1".into(),
            },
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(status.study.manager_id, "M");
    }

    #[tokio::test]
    async fn file_backed_database_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("cohort.db");
        let config = CohortConfig {
            database: DatabaseConfig {
                path: path.to_string_lossy().into_owned(),
                ..Default::default()
            },
            ..Default::default()
        };

        {
            let ctx = AppContext::init(config.clone()).await.unwrap();
            setup(&ctx).await;
        }

        let ctx = AppContext::init(config).await.unwrap();
        let status = study::status(
            &GuildArgs {
                guild: "G1".into(),
            },
            &ctx,
        )
        .await
        .unwrap();
        assert_eq!(status.study.manager_id, "M");
    }
}
