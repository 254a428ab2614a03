//! Command-line interface definition.

use crate::tracing::{LogFormat, LogLevel};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Release orchestration for Cargo monorepos.
#[derive(Parser, Debug)]
#[command(name = "monotag", version, about, long_about = None)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        global = true,
        default_value = "warn",
        value_enum,
        env = "MONOTAG_LOG_LEVEL"
    )]
    pub level: LogLevel,

    /// Log line format on stderr.
    #[arg(long, global = true, default_value = "compact", value_enum)]
    pub log_format: LogFormat,

    /// Print the result as JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Repository root.
    #[arg(long, short = 'p', global = true, default_value = ".")]
    pub path: PathBuf,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tag every unit whose history calls for a new version.
    #[command(about = "Run the release pipeline: check, version, tag, push and write release notes")]
    Release {
        /// Proceed on a dirty working tree and commit pending changes.
        #[arg(long)]
        dirty: bool,

        /// Trust local tags without asking the remote.
        #[arg(long)]
        skip_remote_checks: bool,

        /// Do not ask for confirmation.
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show what a release would do without changing anything.
    #[command(about = "Show each unit's last and next version in release order")]
    Status {
        /// Trust local tags without asking the remote.
        #[arg(long)]
        skip_remote_checks: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_release_flags() {
        let cli = Cli::try_parse_from(["monotag", "release", "--dirty", "-y", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Release {
                dirty: true,
                skip_remote_checks: false,
                yes: true
            }
        ));
    }

    #[test]
    fn test_global_path_after_subcommand() {
        let cli = Cli::try_parse_from(["monotag", "status", "--path", "repo"]).unwrap();
        assert_eq!(cli.path, PathBuf::from("repo"));
        assert!(matches!(cli.level, LogLevel::Warn));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["monotag"]).is_err());
    }
}
