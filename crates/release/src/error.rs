//! Error types for release orchestration.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for release operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning or executing a release.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A version or tag did not decompose into three numeric components.
    #[error("Invalid version: {version}")]
    #[diagnostic(
        code(monotag::release::invalid_version),
        help("Tags must look like <prefix>v<major>.<minor>.<patch>[-<pre>], e.g. api/v1.2.0")
    )]
    InvalidVersion {
        /// The offending input.
        version: String,
    },

    /// Internal units depend on each other in a loop.
    #[error("Dependency cycle between units: {}", units.join(", "))]
    #[diagnostic(
        code(monotag::release::dependency_cycle),
        help("Internal units must form an acyclic graph; break the loop before releasing")
    )]
    DependencyCycle {
        /// Units taking part in the cycle, sorted.
        units: Vec<String>,
    },

    /// Configuration error.
    #[error("Release configuration error: {message}")]
    #[diagnostic(code(monotag::release::config), help("{help}"))]
    Config {
        /// The error message
        message: String,
        /// Help text for the user
        help: String,
    },

    /// Manifest file error.
    #[error("Manifest error: {message}")]
    #[diagnostic(
        code(monotag::release::manifest),
        help("Check that the manifest file exists and is properly formatted")
    )]
    Manifest {
        /// The error message
        message: String,
        /// The manifest file path
        path: Option<PathBuf>,
    },

    /// Git operation error.
    #[error("Git error: {message}")]
    #[diagnostic(
        code(monotag::release::git),
        help("Ensure you are in a git repository and have the necessary permissions")
    )]
    Git {
        /// The error message
        message: String,
    },

    /// A lint or test command failed.
    #[error("Check `{command}` failed: {message}")]
    #[diagnostic(code(monotag::release::check))]
    Check {
        /// The command that ran.
        command: String,
        /// Exit status or captured output.
        message: String,
    },

    /// A collaborator failed while working on one unit.
    #[error("{unit}: {step}: {source}")]
    #[diagnostic(code(monotag::release::unit))]
    Unit {
        /// Unit identity.
        unit: String,
        /// Step that failed.
        step: String,
        /// Underlying error.
        #[source]
        source: Box<Self>,
    },

    /// The release pipeline finished with failed steps.
    #[error("Release failed: {0}")]
    #[diagnostic(
        code(monotag::release::failed),
        help("The report lists every step; fix the first failure and run the release again")
    )]
    Failed(#[from] monotag_task_graph::Error),

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    #[diagnostic(code(monotag::release::io))]
    Io(#[from] std::io::Error),

    /// Wrapped TOML parsing error.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(monotag::release::toml_parse))]
    TomlParse(#[from] toml::de::Error),
}

impl Error {
    /// Create a new invalid version error.
    #[must_use]
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: help.into(),
        }
    }

    /// Create a new manifest error.
    #[must_use]
    pub fn manifest(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::Manifest {
            message: message.into(),
            path,
        }
    }

    /// Create a new git error.
    #[must_use]
    pub fn git(message: impl Into<String>) -> Self {
        Self::Git {
            message: message.into(),
        }
    }

    /// Create a new check error.
    #[must_use]
    pub fn check(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Check {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Attach the unit identity and step name to a collaborator error.
    #[must_use]
    pub fn unit(unit: impl Into<String>, step: impl Into<String>, source: Self) -> Self {
        Self::Unit {
            unit: unit.into(),
            step: step.into(),
            source: Box::new(source),
        }
    }
}
