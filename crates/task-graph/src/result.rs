//! Tiered task outcomes.

use serde::Serialize;
use std::fmt;

/// Tier of a finished task.
///
/// Only [`Outcome::Failure`] affects the success of a run. The advisory
/// tiers exist so reports can distinguish "nothing to do" from "done, but
/// look at this".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The task did its work.
    Success,
    /// Nothing to do, feature disabled, or already satisfied.
    Skip,
    /// The task failed.
    Failure,
    /// Advisory: completed under a relaxed policy.
    Notice,
    /// Advisory: informational only.
    Info,
    /// Advisory: completed, but something deserves attention.
    Warn,
}

impl Outcome {
    /// Short fixed-width label for CLI rendering.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Success => "ok",
            Self::Skip => "skip",
            Self::Failure => "FAIL",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Warn => "warn",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result produced by a task function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskResult {
    /// Tier of the result.
    pub outcome: Outcome,
    /// Short human-readable message.
    pub message: String,
    /// Optional detail, such as the unit a step acted on or a wrapped error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TaskResult {
    fn new(outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            outcome,
            message: message.into(),
            description: None,
        }
    }

    /// A successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Outcome::Success, message)
    }

    /// A skipped result.
    #[must_use]
    pub fn skip(message: impl Into<String>) -> Self {
        Self::new(Outcome::Skip, message)
    }

    /// A failed result.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(Outcome::Failure, message)
    }

    /// An advisory notice.
    #[must_use]
    pub fn notice(message: impl Into<String>) -> Self {
        Self::new(Outcome::Notice, message)
    }

    /// An informational result.
    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Outcome::Info, message)
    }

    /// A warning.
    #[must_use]
    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(Outcome::Warn, message)
    }

    /// Attach a description.
    #[must_use]
    pub fn with_desc(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether this result is a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome == Outcome::Failure
    }
}
