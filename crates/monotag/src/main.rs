//! monotag command-line entry point.

// The CLI writes its result to stdout and the prompt to stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod prompt;
mod tracing;

use crate::cli::{Cli, Commands};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use monotag_release::{
    AssumeYes, Collaborators, Confirm, GitHistory, ReleaseConfig, ReleaseOptions,
    ReleaseOrchestrator, SystemGit, discover_units,
};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing::init_tracing(cli.level, cli.log_format)?;

    match cli.command {
        Commands::Release {
            dirty,
            skip_remote_checks,
            yes,
        } => {
            let options = ReleaseOptions {
                allow_dirty: dirty,
                skip_remote_checks,
            };
            let confirm: Box<dyn Confirm> = if yes {
                Box::new(AssumeYes)
            } else {
                Box::new(prompt::TerminalConfirm)
            };
            release(&cli.path, options, confirm, cli.json)
        }
        Commands::Status { skip_remote_checks } => {
            let options = ReleaseOptions {
                skip_remote_checks,
                ..ReleaseOptions::default()
            };
            status(&cli.path, options, cli.json)
        }
    }
}

fn orchestrator(
    root: &Path,
    options: ReleaseOptions,
    confirm: Box<dyn Confirm>,
) -> Result<ReleaseOrchestrator> {
    let config = ReleaseConfig::load(root)?;
    let units = discover_units(root)?;
    ::tracing::debug!(root = %root.display(), units = units.len(), "workspace loaded");
    let collaborators = Collaborators {
        vcs: Box::new(SystemGit::new(root)),
        history: Box::new(GitHistory::new(root)),
        confirm,
    };
    Ok(ReleaseOrchestrator::new(root, config, units, collaborators).with_options(options))
}

fn release(root: &Path, options: ReleaseOptions, confirm: Box<dyn Confirm>, json: bool) -> Result<()> {
    let run = orchestrator(root, options, confirm)?.release()?;
    if json {
        let out = serde_json::json!({
            "success": run.report.is_success(),
            "report": &run.report,
            "notes": &run.notes,
        });
        println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
    } else {
        print!("{}", run.report);
        if let Some(notes) = &run.notes {
            println!("release notes: {}", notes.display());
        }
    }
    run.ensure_success()?;
    Ok(())
}

fn status(root: &Path, options: ReleaseOptions, json: bool) -> Result<()> {
    let plan = orchestrator(root, options, Box::new(AssumeYes))?.plan()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan).into_diagnostic()?);
    } else {
        print!("{plan}");
    }
    Ok(())
}
