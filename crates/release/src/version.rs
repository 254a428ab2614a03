//! Version arithmetic and release tags.
//!
//! Parsing is strict: after the optional `v` there must be exactly three
//! dot-separated numeric components, optionally followed by `-<pre>`.
//! Nothing is silently defaulted.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Size of a version increment, ordered by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    /// No increment.
    #[default]
    None,
    /// Increment patch.
    Patch,
    /// Increment minor, reset patch.
    Minor,
    /// Increment major, reset minor and patch.
    Major,
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

/// A semantic version `major.minor.patch[-pre]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    /// Major version number.
    pub major: u64,
    /// Minor version number.
    pub minor: u64,
    /// Patch version number.
    pub patch: u64,
    /// Pre-release identifier (e.g., "beta.1").
    pub prerelease: Option<String>,
}

impl Version {
    /// Create a new version.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    /// Create a version with a pre-release identifier.
    #[must_use]
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// Apply a bump. Any increment drops the pre-release identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] when the bumped component would
    /// overflow.
    pub fn bump(&self, bump_type: BumpType) -> Result<Self> {
        let next = |n: u64| {
            n.checked_add(1)
                .ok_or_else(|| Error::invalid_version(format!("{self} cannot take a {bump_type} bump")))
        };
        Ok(match bump_type {
            BumpType::Major => Self::new(next(self.major)?, 0, 0),
            BumpType::Minor => Self::new(self.major, next(self.minor)?, 0),
            BumpType::Patch => Self::new(self.major, self.minor, next(self.patch)?),
            BumpType::None => self.clone(),
        })
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

fn component(raw: &str, input: &str) -> Result<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid_version(input));
    }
    raw.parse().map_err(|_| Error::invalid_version(input))
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);

        let (core, prerelease) = match bare.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(Error::invalid_version(s)),
            None => (bare, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        let [major, minor, patch] = parts.as_slice() else {
            return Err(Error::invalid_version(s));
        };

        Ok(Self {
            major: component(major, s)?,
            minor: component(minor, s)?,
            patch: component(patch, s)?,
            prerelease,
        })
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(ref pre) = self.prerelease {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

/// A version tag namespaced by a unit's tag prefix: `<prefix>v<version>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct ReleaseTag {
    prefix: String,
    version: Version,
}

impl ReleaseTag {
    /// Create a tag from a prefix and a version.
    #[must_use]
    pub fn new(prefix: impl Into<String>, version: Version) -> Self {
        Self {
            prefix: prefix.into(),
            version,
        }
    }

    /// Parse a full tag name that must start with `prefix` followed by `v`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if the prefix or the `v` marker is
    /// missing or the remainder is not a strict three-part version.
    pub fn parse(prefix: &str, tag: &str) -> Result<Self> {
        let rest = tag
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('v'))
            .ok_or_else(|| Error::invalid_version(tag))?;
        if rest.starts_with('v') {
            return Err(Error::invalid_version(tag));
        }
        let version = rest
            .parse::<Version>()
            .map_err(|_| Error::invalid_version(tag))?;
        Ok(Self::new(prefix, version))
    }

    /// The zero tag `<prefix>v0.0.0` used when no prior release exists.
    #[must_use]
    pub fn zero(prefix: impl Into<String>) -> Self {
        Self::new(prefix, Version::default())
    }

    /// Tag prefix, empty for the repository root.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The version part of the tag.
    #[must_use]
    pub const fn version(&self) -> &Version {
        &self.version
    }

    /// The tag with the given bump applied to its version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] when the version would overflow.
    pub fn bump(&self, bump: BumpType) -> Result<Self> {
        Ok(Self::new(self.prefix.clone(), self.version.bump(bump)?))
    }

    /// The last path component of the tag, e.g. `v1.2.0` for `api/v1.2.0`.
    #[must_use]
    pub fn short(&self) -> String {
        format!("v{}", self.version)
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.prefix, self.version)
    }
}

impl From<ReleaseTag> for String {
    fn from(value: ReleaseTag) -> Self {
        value.to_string()
    }
}

impl PartialOrd for ReleaseTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseTag {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix
            .cmp(&other.prefix)
            .then_with(|| self.version.cmp(&other.version))
    }
}
