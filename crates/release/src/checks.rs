//! Lint and test commands run inside unit directories.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Run `command` in `dir`, failing on a non-zero exit.
///
/// # Errors
///
/// Returns [`Error::Config`] for an empty command and [`Error::Check`]
/// when the program cannot be started or exits unsuccessfully.
pub fn run_check(command: &[String], dir: &Path) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        return Err(Error::config(
            "check command is empty",
            "set `command` for [linter] and [tests] when they are enabled",
        ));
    };
    let cmd_line = command.join(" ");
    debug!(cmd = %cmd_line, dir = %dir.display(), "running check");

    let output = Command::new(program)
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::check(&cmd_line, e.to_string()))?;

    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.lines().last().unwrap_or_default().trim().to_string();
    let message = if detail.is_empty() {
        output.status.to_string()
    } else {
        format!("{}: {detail}", output.status)
    };
    Err(Error::check(cmd_line, message))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_successful_check() {
        let dir = tempfile::tempdir().unwrap();
        run_check(&argv(&["true"]), dir.path()).unwrap();
    }

    #[test]
    fn test_failing_check_reports_command() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_check(&argv(&["sh", "-c", "echo broken >&2; exit 3"]), dir.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("sh -c"));
        assert!(message.contains("broken"));
    }

    #[test]
    fn test_missing_program_and_empty_command() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            run_check(&argv(&["monotag-no-such-binary"]), dir.path()),
            Err(Error::Check { .. })
        ));
        assert!(matches!(run_check(&[], dir.path()), Err(Error::Config { .. })));
    }

    #[test]
    fn test_runs_in_unit_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "").unwrap();
        run_check(&argv(&["test", "-f", "marker"]), dir.path()).unwrap();
    }
}
