//! Release orchestration for Cargo monorepos.
//!
//! Every package of a workspace is a *unit* versioned on its own, with
//! tags namespaced by the unit's directory (`crates/api/v1.2.0`). A release
//! run decides per unit whether a new tag is needed, computes the next
//! version from the conventional-commit history since the last tag, orders
//! units so dependencies release first, and drives git to commit, tag and
//! push, writing aggregated release notes at the end.
//!
//! # Architecture
//!
//! - [`version`] - versions, tags and bump arithmetic
//! - [`unit`] - a unit and its per-run [`ReleaseState`]
//! - [`loader`] - per-unit metadata load from tags and history
//! - [`resolver`] - release order over internal dependencies
//! - [`common_deps`] - shared external dependencies and convergence
//! - [`changelog`] - classified changes and the release notes document
//! - [`orchestrator`] - the release pipeline on the task runner
//!
//! Collaborators are traits: [`Vcs`] ([`SystemGit`]), [`Manifest`]
//! ([`CargoManifest`]), [`HistoryClassifier`] ([`GitHistory`]) and
//! [`Confirm`] ([`AssumeYes`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use monotag_release::{
//!     AssumeYes, Collaborators, GitHistory, ReleaseConfig, ReleaseOrchestrator, SystemGit,
//!     discover_units,
//! };
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let config = ReleaseConfig::load(root)?;
//! let units = discover_units(root)?;
//! let collaborators = Collaborators {
//!     vcs: Box::new(SystemGit::new(root)),
//!     history: Box::new(GitHistory::new(root)),
//!     confirm: Box::new(AssumeYes),
//! };
//! let plan = ReleaseOrchestrator::new(root, config, units, collaborators).plan()?;
//! println!("{plan}");
//! # Ok::<(), monotag_release::Error>(())
//! ```

#![warn(missing_docs)]

pub mod changelog;
pub mod checks;
pub mod common_deps;
pub mod config;
pub mod confirm;
pub mod conventional;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod orchestrator;
pub mod resolver;
mod tagging;
pub mod unit;
pub mod vcs;
pub mod version;
pub mod workspace;

pub use changelog::{ChangeCategory, ChangeEntry, Changelog, ReleaseNotes, UnitNotes};
pub use common_deps::{CommonDependency, DependencyBump, common_dependencies, converge};
pub use config::{
    CheckConfig, LockfileConfig, ReleaseConfig, ReleaseGitConfig, ReleaseOptions, ReleaserConfig,
};
pub use confirm::{AssumeYes, Confirm};
pub use conventional::{GitHistory, HistoryClassifier, HistoryQuery};
pub use error::{Error, Result};
pub use manifest::{CargoManifest, Dependency, Manifest};
pub use orchestrator::{Collaborators, ReleaseOrchestrator, ReleasePlan, ReleaseRun, UnitStatus};
pub use resolver::release_order;
pub use unit::{ReleaseState, Unit};
pub use vcs::{SystemGit, Vcs};
pub use version::{BumpType, ReleaseTag, Version};
pub use workspace::discover_units;
