//! Unit discovery from the root `Cargo.toml`.
//!
//! Units are the workspace members (glob patterns expanded, `exclude`
//! honoured) plus the root package when the root manifest declares one.

use crate::error::{Error, Result};
use crate::manifest::{CargoManifest, Manifest};
use crate::unit::Unit;
use glob::{Pattern, glob};
use serde::Deserialize;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

const CARGO_TOML: &str = "Cargo.toml";

#[derive(Debug, Default, Deserialize)]
struct RootManifest {
    workspace: Option<WorkspaceSection>,
    package: Option<toml::Table>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkspaceSection {
    members: Vec<String>,
    exclude: Vec<String>,
}

/// Tag prefix for a unit directory: the path relative to `root` joined
/// with `/` and terminated by `/`, empty for the root itself.
#[must_use]
pub fn tag_prefix(root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if segments.is_empty() {
        String::new()
    } else {
        format!("{}/", segments.join("/"))
    }
}

fn has_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn excluded(root: &Path, dir: &Path, excludes: &[String]) -> bool {
    let Ok(relative) = dir.strip_prefix(root) else {
        return false;
    };
    let Some(relative) = relative.to_str() else {
        return false;
    };
    excludes.iter().any(|exclude| {
        if has_glob(exclude) {
            Pattern::new(exclude).is_ok_and(|p| p.matches(relative))
        } else {
            relative == exclude.trim_end_matches('/')
        }
    })
}

fn member_dirs(root: &Path, workspace: &WorkspaceSection) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for pattern in &workspace.members {
        if has_glob(pattern) {
            let full = root.join(pattern);
            let full = full.to_str().ok_or_else(|| {
                Error::config(
                    format!("workspace member pattern {pattern} is not valid UTF-8"),
                    "rename the directory",
                )
            })?;
            let entries = glob(full).map_err(|e| {
                Error::config(
                    format!("invalid workspace member pattern {pattern}: {e}"),
                    "fix [workspace].members in the root Cargo.toml",
                )
            })?;
            dirs.extend(entries.filter_map(std::result::Result::ok).filter(|p| p.is_dir()));
        } else {
            dirs.push(root.join(pattern));
        }
    }
    dirs.retain(|dir| !excluded(root, dir, &workspace.exclude) && dir.join(CARGO_TOML).is_file());
    dirs.sort();
    dirs.dedup();
    Ok(dirs)
}

/// Load every unit of the repository at `root`, ordered by tag prefix.
///
/// # Errors
///
/// Returns an error if the root manifest or a member manifest cannot be
/// read, or if the root declares neither a workspace nor a package.
pub fn discover_units(root: &Path) -> Result<Vec<Unit>> {
    let root_manifest_path = root.join(CARGO_TOML);
    let content = fs::read_to_string(&root_manifest_path).map_err(|e| {
        Error::manifest(format!("cannot read root manifest: {e}"), Some(root_manifest_path.clone()))
    })?;
    let manifest: RootManifest = toml::from_str(&content)?;

    let mut units = Vec::new();
    if manifest.package.is_some() {
        let parsed = CargoManifest::parse(&root_manifest_path, &content)?;
        units.push(Unit::new(root, "", Box::new(parsed)));
    }
    if let Some(workspace) = &manifest.workspace {
        for dir in member_dirs(root, workspace)? {
            if dir == root {
                continue;
            }
            let parsed = CargoManifest::load(&dir.join(CARGO_TOML))?;
            let prefix = tag_prefix(root, &dir);
            debug!(unit = parsed.name(), prefix = %prefix, "discovered unit");
            units.push(Unit::new(dir, prefix, Box::new(parsed)));
        }
    }

    if units.is_empty() {
        return Err(Error::config(
            "no units found",
            "the root Cargo.toml must declare a [package] or [workspace] members",
        ));
    }
    units.sort_by(|a, b| a.tag_prefix.cmp(&b.tag_prefix));
    Ok(units)
}

/// Directories of the units nested below `unit_prefix`, relative to the
/// root, used to keep their history out of the enclosing unit's changelog.
#[must_use]
pub fn nested_dirs(unit_prefix: &str, prefixes: &[&str]) -> Vec<PathBuf> {
    prefixes
        .iter()
        .filter(|p| !p.is_empty() && **p != unit_prefix && p.starts_with(unit_prefix))
        .map(|p| PathBuf::from(p.trim_end_matches('/')))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn package(name: &str) -> String {
        format!("[package]\nname = \"{name}\"\nversion = \"0.1.0\"\n")
    }

    #[test]
    fn test_tag_prefix() {
        let root = Path::new("/repo");
        assert_eq!(tag_prefix(root, Path::new("/repo")), "");
        assert_eq!(tag_prefix(root, Path::new("/repo/crates/api")), "crates/api/");
    }

    #[test]
    fn test_discover_workspace_with_root_package() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join(CARGO_TOML),
            "[package]\nname = \"mono\"\nversion = \"0.1.0\"\n\n[workspace]\nmembers = [\"crates/*\", \"tools/gen\"]\nexclude = [\"crates/scratch\"]\n",
        );
        write(&root.join("crates/api/Cargo.toml"), &package("api"));
        write(&root.join("crates/web/Cargo.toml"), &package("web"));
        write(&root.join("crates/scratch/Cargo.toml"), &package("scratch"));
        write(&root.join("tools/gen/Cargo.toml"), &package("gen"));
        fs::create_dir_all(root.join("crates/empty")).unwrap();

        let units = discover_units(root).unwrap();
        let found: Vec<(&str, &str)> = units
            .iter()
            .map(|u| (u.id.as_str(), u.tag_prefix.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("mono", ""),
                ("api", "crates/api/"),
                ("web", "crates/web/"),
                ("gen", "tools/gen/"),
            ]
        );
        assert_eq!(units[1].manifest.name(), "api");
    }

    #[test]
    fn test_discover_single_package() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join(CARGO_TOML), &package("solo"));
        let units = discover_units(dir.path()).unwrap();
        assert_eq!(units.len(), 1);
        assert!(units[0].is_root());
    }

    #[test]
    fn test_discover_requires_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_units(dir.path()),
            Err(Error::Manifest { .. })
        ));

        write(&dir.path().join(CARGO_TOML), "[workspace]\nmembers = []\n");
        assert!(matches!(discover_units(dir.path()), Err(Error::Config { .. })));
    }

    #[test]
    fn test_nested_dirs() {
        let prefixes = ["", "crates/", "crates/api/", "web/"];
        assert_eq!(
            nested_dirs("", &prefixes),
            vec![PathBuf::from("crates"), PathBuf::from("crates/api"), PathBuf::from("web")]
        );
        assert_eq!(nested_dirs("crates/", &prefixes), vec![PathBuf::from("crates/api")]);
        assert!(nested_dirs("web/", &prefixes).is_empty());
    }
}
