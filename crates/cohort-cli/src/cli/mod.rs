use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `cohort` binary.
#[derive(Debug, Parser)]
#[command(name = "cohort", version, about = "Cohort - study round coordinator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
            verbose: self.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use cohort_coordinator::UpdateParams;
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_before_and_after_subcommand() {
        let cli = Cli::try_parse_from(["cohort", "--format", "raw", "--verbose", "commands"])
            .expect("cli should parse");
        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Commands));

        let cli = Cli::try_parse_from(["cohort", "rounds", "--guild", "G1", "--quiet"])
            .expect("cli should parse");
        assert!(cli.quiet);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Rounds(ref args) if args.guild == "G1"));
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        assert!(Cli::try_parse_from(["cohort", "--format", "table", "commands"]).is_err());
    }

    #[test]
    fn exec_flags_map_onto_update_params() {
        let cli = Cli::try_parse_from([
            "cohort",
            "exec",
            "create-study-round",
            "--guild",
            "G1",
            "--manager",
            "M",
            "--title",
            "Async",
            "--members",
            "A,B,C",
        ])
        .expect("cli should parse");

        let Commands::Exec(args) = cli.command else {
            panic!("expected exec");
        };
        assert_eq!(args.command, "create-study-round");
        let params = UpdateParams::from(args.params);
        assert_eq!(
            params,
            UpdateParams::new("G1")
                .with_manager("M")
                .with_round("Async", ["A", "B", "C"])
        );
    }

    #[test]
    fn exec_requires_guild() {
        assert!(Cli::try_parse_from(["cohort", "exec", "move-stage"]).is_err());
    }

    #[test]
    fn recorder_defaults() {
        let cli = Cli::try_parse_from(["cohort", "recorder"]).expect("cli should parse");
        let Commands::Recorder(args) = cli.command else {
            panic!("expected recorder");
        };
        assert!(!args.dry_run);
        assert_eq!(args.handler_timeout_secs, 5);
    }
}
