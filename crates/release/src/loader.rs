//! Per-unit release metadata loading.
//!
//! Reads a unit's tags, decides between first, pending and regular
//! release, classifies its history and applies the version rules from
//! [`Unit`]. Loading is a pure function of the repository state: running
//! it twice against unchanged tags and history yields the same result.

use crate::conventional::{HistoryClassifier, HistoryQuery};
use crate::error::Result;
use crate::unit::Unit;
use crate::vcs::Vcs;
use crate::version::{ReleaseTag, Version};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Inputs shared by every unit's metadata load.
#[derive(Debug, Clone)]
pub struct LoadSettings {
    /// Remote consulted for pending-release detection.
    pub remote: String,
    /// Version of a first release.
    pub baseline: Version,
    /// Next-version override file name inside the unit directory.
    pub version_file: String,
    /// Trust the newest local tag without asking the remote.
    pub skip_remote_checks: bool,
}

/// Release tags of the unit with `prefix`, oldest first.
///
/// Tags whose remainder after the prefix contains `/` belong to nested
/// units and are ignored.
///
/// # Errors
///
/// Returns an error if tags cannot be listed or a tag of this unit is not
/// a valid version.
pub fn release_tags(vcs: &dyn Vcs, prefix: &str) -> Result<Vec<ReleaseTag>> {
    let mut tags = vcs
        .list_tags(&format!("{prefix}v*"))?
        .iter()
        .filter(|tag| {
            tag.strip_prefix(prefix)
                .is_some_and(|rest| !rest.contains('/'))
        })
        .map(|tag| ReleaseTag::parse(prefix, tag))
        .collect::<Result<Vec<_>>>()?;
    tags.sort();
    Ok(tags)
}

/// Read a next-version override from `dir/file`. Missing or invalid
/// content yields `None`.
#[must_use]
pub fn read_version_override(dir: &Path, file: &str) -> Option<Version> {
    let content = fs::read_to_string(dir.join(file)).ok()?;
    content.trim().parse().ok()
}

/// Populate `unit`'s release state and changelog.
///
/// `nested` lists the directories of units below this one whose history is
/// excluded.
///
/// # Errors
///
/// Returns an error if tags or history cannot be read or a tag is invalid.
pub fn load_unit(
    unit: &mut Unit,
    vcs: &dyn Vcs,
    history: &dyn HistoryClassifier,
    nested: &[PathBuf],
    settings: &LoadSettings,
) -> Result<()> {
    if unit.internal {
        unit.mark_internal();
        debug!(unit = %unit.id, "internal unit, never tagged");
        return Ok(());
    }

    let tags = release_tags(vcs, &unit.tag_prefix)?;
    let Some((latest, older)) = tags.split_last() else {
        unit.mark_first_release(&settings.baseline);
        apply_override(unit, settings);
        unit.ensure_changelog();
        return Ok(());
    };

    let confirmed = settings.skip_remote_checks || vcs.remote_tag_exists(&settings.remote, &latest.to_string());
    if confirmed {
        unit.state.last_tag = Some(latest.clone());
        unit.state.next_tag_remote_exists = !settings.skip_remote_checks;
        let from = latest.to_string();
        unit.changelog = history.classify(&HistoryQuery {
            from: Some(&from),
            to: "HEAD",
            scope: unit.scope(),
            exclude: nested,
        })?;
        unit.apply_changelog()?;
        apply_override(unit, settings);
    } else {
        let remote = older
            .iter()
            .rev()
            .find(|tag| vcs.remote_tag_exists(&settings.remote, &tag.to_string()))
            .cloned();
        let from = remote.as_ref().map(ToString::to_string);
        let to = latest.to_string();
        debug!(unit = %unit.id, tag = %to, confirmed = ?from, "pending release");
        unit.changelog = history.classify(&HistoryQuery {
            from: from.as_deref(),
            to: &to,
            scope: unit.scope(),
            exclude: nested,
        })?;
        unit.mark_pending(latest.clone(), remote);
    }

    unit.ensure_changelog();
    debug!(
        unit = %unit.id,
        needs_release = unit.state.needs_release,
        transition = %unit.transition(),
        "release metadata loaded"
    );
    Ok(())
}

fn apply_override(unit: &mut Unit, settings: &LoadSettings) {
    if let Some(version) = read_version_override(&unit.dir, &settings.version_file)
        && unit.apply_version_override(&version)
    {
        debug!(unit = %unit.id, %version, "next version overridden");
    }
}
