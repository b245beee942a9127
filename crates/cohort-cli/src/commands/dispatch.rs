use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;
use crate::context::AppContext;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(command: Commands, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    match command {
        Commands::Setup(args) => commands::study::handle_setup(&args, ctx, flags).await,
        Commands::Status(args) => commands::study::handle_status(&args, ctx, flags).await,
        Commands::Rounds(args) => commands::study::handle_rounds(&args, ctx, flags).await,
        Commands::Speakers(args) => commands::study::handle_speakers(&args, ctx, flags).await,
        Commands::Member(args) => commands::study::handle_member(&args, ctx, flags).await,
        Commands::Exec(args) => commands::exec::handle(&args, ctx, flags).await,
        Commands::Recorder(_) | Commands::Commands => {
            anyhow::bail!("recorder and commands are pre-dispatched in main")
        }
    }
}
