//! Errors of graph ordering and task execution.

use std::fmt;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Graph and runner errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The graph is not acyclic.
    Cycle {
        /// Every node on a cycle, sorted.
        nodes: Vec<String>,
    },

    /// Nodes name dependencies that were never inserted.
    UnknownDependencies {
        /// `(node, dependency)` pairs.
        missing: Vec<(String, String)>,
    },

    /// A task was registered after a task id the runner never issued.
    UnknownTask {
        /// Name of the task being registered.
        task: String,
        /// The unknown predecessor id.
        dependency: usize,
    },

    /// At least one executed task reported failure.
    TasksFailed {
        /// Number of failed tasks.
        failed: usize,
        /// `name: message` of the first failure in execution order.
        first: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cycle { nodes } => write!(f, "dependency cycle between {}", nodes.join(", ")),
            Self::UnknownDependencies { missing } => {
                f.write_str("unknown dependencies:")?;
                for (i, (node, dep)) in missing.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{sep}{node} -> {dep}")?;
                }
                Ok(())
            }
            Self::UnknownTask { task, dependency } => {
                write!(f, "task '{task}' runs after unknown task #{dependency}")
            }
            Self::TasksFailed { failed: 1, first } => write!(f, "1 task failed: {first}"),
            Self::TasksFailed { failed, first } => {
                write!(f, "{failed} tasks failed, first: {first}")
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_display() {
        let err = Error::Cycle {
            nodes: vec!["api".to_string(), "core".to_string()],
        };
        assert_eq!(err.to_string(), "dependency cycle between api, core");
    }

    #[test]
    fn test_unknown_dependencies_display() {
        let err = Error::UnknownDependencies {
            missing: vec![
                ("api".to_string(), "ghost".to_string()),
                ("web".to_string(), "gone".to_string()),
            ],
        };
        assert_eq!(err.to_string(), "unknown dependencies: api -> ghost, web -> gone");
    }

    #[test]
    fn test_tasks_failed_display() {
        let one = Error::TasksFailed {
            failed: 1,
            first: "api: tag: push rejected".to_string(),
        };
        assert_eq!(one.to_string(), "1 task failed: api: tag: push rejected");

        let many = Error::TasksFailed {
            failed: 3,
            first: "linting: lint failed".to_string(),
        };
        assert_eq!(many.to_string(), "3 tasks failed, first: linting: lint failed");
    }
}
