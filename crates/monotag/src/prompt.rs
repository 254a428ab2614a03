//! Interactive confirmation on the terminal.

use monotag_release::confirm::summary_lines;
use monotag_release::{Confirm, Error, Result, Unit};
use std::io::{self, BufRead, IsTerminal, Write};

/// Asks on stderr and reads the answer from stdin.
#[derive(Debug, Default)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm_releasables(&mut self, units: &[&Unit]) -> Result<bool> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Err(Error::config(
                "confirmation needs an interactive terminal",
                "pass --yes to release without asking",
            ));
        }
        let mut err = io::stderr().lock();
        write_prompt(&mut err, units)?;
        let mut answer = String::new();
        stdin.lock().read_line(&mut answer)?;
        Ok(accepts(&answer))
    }
}

fn write_prompt(out: &mut impl Write, units: &[&Unit]) -> io::Result<()> {
    writeln!(out, "Units to release:")?;
    for line in summary_lines(units) {
        writeln!(out, "  {line}")?;
    }
    write!(out, "Continue? [y/N] ")?;
    out.flush()
}

fn accepts(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts() {
        assert!(accepts("y\n"));
        assert!(accepts(" YES "));
        assert!(!accepts("\n"));
        assert!(!accepts("no"));
        assert!(!accepts("yep"));
    }

    #[test]
    fn test_prompt_without_units() {
        let mut out = Vec::new();
        write_prompt(&mut out, &[]).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Units to release:\nContinue? [y/N] "
        );
    }
}
