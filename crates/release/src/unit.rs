//! Units and their per-run release state.
//!
//! A [`Unit`] is created fresh for every run and discarded at the end; the
//! only durable record of a release is the version-control tag. The methods
//! here are the version decision rules applied to one unit's state.

use crate::changelog::{ChangeCategory, ChangeEntry, Changelog};
use crate::error::{Error, Result};
use crate::manifest::{Dependency, Manifest};
use crate::version::{BumpType, ReleaseTag, Version};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subject of the entry added for a release that has no recorded changes.
pub const INITIAL_RELEASE: &str = "initial release";

/// Discovered release facts of one unit.
///
/// `pending_release` and `first_release` never hold together, and
/// `next_tag` is set whenever `needs_release` is. Internal units keep both
/// tags `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseState {
    /// No prior release tag exists.
    pub first_release: bool,
    /// A new tag must be created.
    pub needs_release: bool,
    /// A tag exists locally but not on the remote.
    pub pending_release: bool,
    /// Tag to create (or already created, when pending).
    pub next_tag: Option<ReleaseTag>,
    /// Latest released tag.
    pub last_tag: Option<ReleaseTag>,
    /// The latest local tag is confirmed on the remote.
    pub next_tag_remote_exists: bool,
}

/// One independently versioned package.
#[derive(Debug)]
pub struct Unit {
    /// Import identity.
    pub id: String,
    /// Absolute directory.
    pub dir: PathBuf,
    /// Directory relative to the repository root plus `/`, empty for the root.
    pub tag_prefix: String,
    /// Lives under an `internal` namespace and is never tagged.
    pub internal: bool,
    /// A dependency requirement was raised during this run.
    pub update_deps: bool,
    /// Parsed manifest.
    pub manifest: Box<dyn Manifest>,
    /// Release facts.
    pub state: ReleaseState,
    /// Changes since the last release.
    pub changelog: Changelog,
}

/// Whether a unit identity or tag prefix places it in an internal namespace.
#[must_use]
pub fn is_internal(id: &str, tag_prefix: &str) -> bool {
    id.contains("internal")
        || tag_prefix
            .split('/')
            .any(|segment| segment.contains("internal"))
}

impl Unit {
    /// Build a unit from its manifest.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, tag_prefix: impl Into<String>, manifest: Box<dyn Manifest>) -> Self {
        let tag_prefix = tag_prefix.into();
        let id = manifest.name().to_string();
        Self {
            internal: is_internal(&id, &tag_prefix),
            id,
            dir: dir.into(),
            tag_prefix,
            update_deps: false,
            manifest,
            state: ReleaseState::default(),
            changelog: Changelog::new(),
        }
    }

    /// Short display name: the last directory component, or the id.
    #[must_use]
    pub fn name(&self) -> &str {
        self.tag_prefix
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(self.id.as_str())
    }

    /// Whether this unit sits at the repository root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.tag_prefix.is_empty()
    }

    /// Directory used to scope history queries, `.` for the root.
    #[must_use]
    pub fn scope(&self) -> &Path {
        let trimmed = self.tag_prefix.trim_end_matches('/');
        if trimmed.is_empty() {
            Path::new(".")
        } else {
            Path::new(trimmed)
        }
    }

    /// Declared dependencies.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        self.manifest.dependencies()
    }

    /// Whether a tag should be created this run.
    #[must_use]
    pub fn releasable(&self) -> bool {
        self.state.needs_release && !self.state.pending_release
    }

    /// Reset to "not applicable": internal units are never tagged.
    pub fn mark_internal(&mut self) {
        self.internal = true;
        self.state = ReleaseState::default();
        self.changelog = Changelog::new();
    }

    /// No prior tag: start at `baseline` from the zero tag.
    pub fn mark_first_release(&mut self, baseline: &Version) {
        self.state.first_release = true;
        self.state.needs_release = true;
        self.state.pending_release = false;
        self.state.last_tag = Some(ReleaseTag::zero(&self.tag_prefix));
        self.state.next_tag = Some(ReleaseTag::new(&self.tag_prefix, baseline.clone()));
    }

    /// The latest local tag is not on the remote.
    ///
    /// `pending` stays the next tag so a later run never re-tags at a
    /// different version. `confirmed` is the newest older tag found on the
    /// remote; without one the zero tag stands in.
    pub fn mark_pending(&mut self, pending: ReleaseTag, confirmed: Option<ReleaseTag>) {
        self.state.first_release = false;
        self.state.pending_release = true;
        self.state.needs_release = true;
        self.state.next_tag_remote_exists = false;
        self.state.last_tag = Some(confirmed.unwrap_or_else(|| ReleaseTag::zero(&self.tag_prefix)));
        self.state.next_tag = Some(pending);
    }

    /// Apply the changelog's bump to the last tag.
    ///
    /// Only-`other` changelogs leave the state as it was, so earlier
    /// triggers keep their effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if a bump is needed but no last tag
    /// is known.
    pub fn apply_changelog(&mut self) -> Result<BumpType> {
        let bump = self.changelog.bump_type();
        if bump == BumpType::None {
            return Ok(bump);
        }
        let last = self
            .state
            .last_tag
            .as_ref()
            .ok_or_else(|| Error::invalid_version(format!("{}: no last release tag", self.id)))?;
        let next = last.bump(bump)?;
        debug!(unit = %self.id, %bump, tag = %next, "computed next release");
        self.state.next_tag = Some(next);
        self.state.needs_release = true;
        Ok(bump)
    }

    /// Use `version` as the next version when it is strictly greater than
    /// the current candidate: the next tag if computed, else the last tag.
    ///
    /// Returns whether the override took effect.
    pub fn apply_version_override(&mut self, version: &Version) -> bool {
        let candidate = self
            .state
            .next_tag
            .as_ref()
            .or(self.state.last_tag.as_ref());
        if candidate.is_some_and(|tag| version <= tag.version()) {
            return false;
        }
        self.state.next_tag = Some(ReleaseTag::new(&self.tag_prefix, version.clone()));
        self.state.needs_release = true;
        true
    }

    /// A release with nothing recorded still gets one entry.
    pub fn ensure_changelog(&mut self) {
        if self.state.needs_release && self.changelog.is_empty() {
            self.changelog
                .push(ChangeEntry::new(ChangeCategory::Feature, INITIAL_RELEASE));
        }
    }

    /// Raise the requirement on `dependency` to `version`.
    ///
    /// Internal units and requirements already at or above `version` are
    /// left alone. Otherwise the unit needs a release; if no newer tag was
    /// computed yet it becomes a patch release.
    ///
    /// Returns whether the requirement changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest rejects the edit or no last tag is
    /// known for the patch bump.
    pub fn bump_dependency(&mut self, dependency: &str, version: &Version) -> Result<bool> {
        if self.internal {
            return Ok(false);
        }
        let current = self
            .dependencies()
            .into_iter()
            .find(|d| d.id == dependency)
            .and_then(|d| d.version);
        if current.as_ref().is_some_and(|c| version <= c) {
            return Ok(false);
        }

        let patch = if self.state.next_tag.is_none() || self.state.next_tag == self.state.last_tag {
            let last = self.state.last_tag.as_ref().ok_or_else(|| {
                Error::invalid_version(format!("{}: no last release tag", self.id))
            })?;
            Some(last.bump(BumpType::Patch)?)
        } else {
            None
        };

        self.manifest.add_or_bump_dependency(dependency, version)?;
        self.update_deps = true;
        self.state.needs_release = true;
        if patch.is_some() {
            self.state.next_tag = patch;
        }
        debug!(unit = %self.id, dependency, %version, "dependency requirement raised");
        Ok(true)
    }

    /// Full name of the last release tag, `-` when there is none.
    #[must_use]
    pub fn last_tag_name(&self) -> String {
        self.state
            .last_tag
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string)
    }

    /// `last -> next` summary used in reports; just the last tag when
    /// nothing is released.
    #[must_use]
    pub fn transition(&self) -> String {
        let short = |tag: &Option<ReleaseTag>| {
            tag.as_ref()
                .map_or_else(|| "-".to_string(), ReleaseTag::short)
        };
        if self.state.first_release {
            return format!("{}{}", self.tag_prefix, short(&self.state.next_tag));
        }
        if self.state.next_tag.is_none() {
            return self
                .state
                .last_tag
                .as_ref()
                .map_or_else(|| "-".to_string(), ToString::to_string);
        }
        format!(
            "{}{} -> {}",
            self.tag_prefix,
            short(&self.state.last_tag),
            short(&self.state.next_tag)
        )
    }
}
