//! Run report collected by the [`Runner`](crate::Runner).

use crate::runner::TaskId;
use crate::{Error, Outcome, Result, TaskResult};
use serde::Serialize;
use std::fmt::{self, Write as _};

/// One executed (or halted) task.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    /// Task identity.
    pub id: TaskId,
    /// Task name.
    pub name: String,
    /// Spawning task, for subtasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<TaskId>,
    /// Nesting depth, 0 for top-level tasks.
    pub depth: usize,
    /// What the task returned.
    #[serde(flatten)]
    pub result: TaskResult,
}

/// Ordered record of a run, in execution order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    name: String,
    entries: Vec<ReportEntry>,
}

impl Report {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, entry: ReportEntry) {
        self.entries.push(entry);
    }

    /// Name of the run.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All entries in execution order.
    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.result.is_failure())
    }

    /// Number of entries with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: Outcome) -> usize {
        self.entries
            .iter()
            .filter(|e| e.result.outcome == outcome)
            .count()
    }

    /// Whether no task failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// First entry with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Convert a report with failures into an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TasksFailed`] if any task failed.
    pub fn ensure_success(&self) -> Result<()> {
        let mut failures = self.failures();
        let Some(first) = failures.next() else {
            return Ok(());
        };
        Err(Error::TasksFailed {
            failed: 1 + failures.count(),
            first: format!("{}: {}", first.name, first.result.message),
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        for entry in &self.entries {
            let mut line = String::new();
            for _ in 0..=entry.depth {
                line.push_str("  ");
            }
            let _ = write!(
                line,
                "[{:>6}] {}: {}",
                entry.result.outcome.label(),
                entry.name,
                entry.result.message
            );
            if let Some(desc) = &entry.result.description {
                let _ = write!(line, " ({desc})");
            }
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Executor, Runner, TaskResult};

    fn sample() -> crate::Report {
        let mut runner: Runner<()> = Runner::new("release");
        runner.add("check", |ex: &mut Executor<'_, ()>| {
            ex.subtask("unit a", |_ex: &mut Executor<'_, ()>| {
                TaskResult::skip("no release needed").with_desc("v1.0.0")
            });
            TaskResult::success("checked")
        });
        runner.add("push", |_ex: &mut Executor<'_, ()>| {
            TaskResult::failure("rejected")
        });
        runner.run(&mut ())
    }

    #[test]
    fn test_display_indents_subtasks() {
        let text = sample().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "release");
        assert_eq!(lines[1], "  [    ok] check: checked");
        assert_eq!(lines[2], "    [  skip] unit a: no release needed (v1.0.0)");
        assert_eq!(lines[3], "  [  FAIL] push: rejected");
    }

    #[test]
    fn test_counts_and_lookup() {
        let report = sample();
        assert_eq!(report.count(crate::Outcome::Skip), 1);
        assert_eq!(report.find("push").unwrap().result.message, "rejected");
        assert!(report.find("missing").is_none());
    }

    #[test]
    fn test_json_flattens_result() {
        let json = serde_json::to_value(sample()).unwrap();
        let first = &json["entries"][0];
        assert_eq!(first["name"], "check");
        assert_eq!(first["outcome"], "success");
        assert!(first.get("parent").is_none());
        assert_eq!(json["entries"][1]["parent"], 0);
    }
}
