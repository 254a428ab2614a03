//! Release configuration types.
//!
//! Configuration lives in `.monotag.toml` at the repository root. Every
//! section is optional; a missing file means defaults throughout.

use crate::error::{Error, Result};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration file name at the repository root.
pub const CONFIG_FILE: &str = ".monotag.toml";

/// Complete release configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Git-related release settings.
    pub git: ReleaseGitConfig,
    /// Tagging and release notes settings.
    pub releaser: ReleaserConfig,
    /// Lint command run in every unit.
    pub linter: CheckConfig,
    /// Test command run in every unit.
    pub tests: CheckConfig,
    /// Lockfile refresh run after each manifest edit.
    pub lockfile: LockfileConfig,
}

impl ReleaseConfig {
    /// Load `.monotag.toml` from `root`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    /// Parse configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Fail unless releasing is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `releaser.enabled` is false.
    pub fn ensure_releases_enabled(&self) -> Result<()> {
        if self.releaser.enabled {
            Ok(())
        } else {
            Err(Error::config(
                "releases are disabled",
                format!("set `enabled = true` under [releaser] in {CONFIG_FILE}"),
            ))
        }
    }
}

/// Git-related release configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseGitConfig {
    /// Branch releases must be cut from.
    pub branch: String,
    /// Expected upstream remote name.
    pub remote_name: String,
    /// Expected upstream remote URL; only the name is checked when unset.
    pub remote_url: Option<String>,
}

impl Default for ReleaseGitConfig {
    fn default() -> Self {
        Self {
            branch: "main".to_string(),
            remote_name: "origin".to_string(),
            remote_url: None,
        }
    }
}

/// Tagging and release notes configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaserConfig {
    /// Whether releases may be cut at all.
    pub enabled: bool,
    /// Output directory for release notes, relative to the root.
    pub dist: PathBuf,
    /// Version of a unit's first release.
    pub baseline: Version,
    /// Next-version override file inside a unit directory.
    pub version_file: String,
}

impl Default for ReleaserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dist: PathBuf::from("dist"),
            baseline: Version::new(0, 1, 0),
            version_file: "VERSION".to_string(),
        }
    }
}

/// An external check run in each unit directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Whether the check runs.
    pub enabled: bool,
    /// Program and arguments.
    pub command: Vec<String>,
}

/// Command that brings `Cargo.lock` in line with edited manifests.
///
/// It runs in the repository root after a unit's manifest is saved with
/// path overrides and again after they are dropped. A failure fails the
/// unit before anything is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockfileConfig {
    /// Whether the refresh runs and `Cargo.lock` is committed with the unit.
    pub enabled: bool,
    /// Program and arguments.
    pub command: Vec<String>,
}

impl Default for LockfileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: vec![
                "cargo".to_string(),
                "update".to_string(),
                "--workspace".to_string(),
            ],
        }
    }
}

/// Runtime switches that are not part of the configuration file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReleaseOptions {
    /// Downgrade a dirty working tree from failure to notice.
    pub allow_dirty: bool,
    /// Trust the newest local tag without asking the remote.
    pub skip_remote_checks: bool,
}
