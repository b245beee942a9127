use clap::{Args, Subcommand};

use cohort_coordinator::UpdateParams;

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Run the recorder: write bus events to the spreadsheet until Ctrl-C.
    Recorder(RecorderArgs),
    /// Create the study for a guild if it does not exist.
    Setup(SetupArgs),
    /// Show a guild's study and its ongoing round.
    Status(GuildArgs),
    /// List every round of a guild, newest first.
    Rounds(GuildArgs),
    /// List registered speakers of the ongoing round.
    Speakers(GuildArgs),
    /// Show one member of the ongoing round.
    Member(MemberArgs),
    /// Run a registry command (e.g. `move-round-stage`, `register`). Commands
    /// needing guild-admin rights are refused.
    Exec(ExecArgs),
    /// List registry commands.
    Commands,
}

#[derive(Clone, Debug, Args)]
pub struct RecorderArgs {
    /// Record into memory instead of the configured spreadsheet.
    #[arg(long)]
    pub dry_run: bool,

    /// Per-message handler deadline in seconds.
    #[arg(long, default_value = "5")]
    pub handler_timeout_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct SetupArgs {
    #[arg(long)]
    pub guild: String,

    #[arg(long)]
    pub manager: String,
}

#[derive(Clone, Debug, Args)]
pub struct GuildArgs {
    #[arg(long)]
    pub guild: String,
}

#[derive(Clone, Debug, Args)]
pub struct MemberArgs {
    #[arg(long)]
    pub guild: String,

    #[arg(long)]
    pub member: String,
}

#[derive(Clone, Debug, Args)]
pub struct ExecArgs {
    /// Registry command name.
    pub command: String,

    #[command(flatten)]
    pub params: ParamsArgs,
}

/// One flag per `UpdateParams` field. Unset flags stay empty.
#[derive(Clone, Debug, Default, Args)]
pub struct ParamsArgs {
    #[arg(long)]
    pub guild: String,

    /// Acting user; checked against the study manager for manager commands.
    #[arg(long, default_value = "")]
    pub manager: String,

    #[arg(long, default_value = "")]
    pub channel: String,

    #[arg(long, default_value = "")]
    pub member: String,

    #[arg(long, default_value = "")]
    pub name: String,

    #[arg(long, default_value = "")]
    pub subject: String,

    /// Content, recording or spreadsheet URL, depending on the command.
    #[arg(long, default_value = "")]
    pub url: String,

    #[arg(long, default_value = "")]
    pub reviewer: String,

    #[arg(long, default_value = "")]
    pub reviewee: String,

    #[arg(long, default_value = "")]
    pub title: String,

    /// Comma-separated member ids for a new round.
    #[arg(long, value_delimiter = ',')]
    pub members: Vec<String>,
}

impl From<ParamsArgs> for UpdateParams {
    fn from(args: ParamsArgs) -> Self {
        Self {
            guild_id: args.guild,
            manager_id: args.manager,
            channel_id: args.channel,
            member_id: args.member,
            member_name: args.name,
            subject: args.subject,
            content_url: args.url,
            reviewer_id: args.reviewer,
            reviewee_id: args.reviewee,
            title: args.title,
            member_ids: args.members,
        }
    }
}
