//! Unit manifests.
//!
//! The engine sees manifests through the [`Manifest`] trait: a unit's
//! identity, its declared dependencies with their required floor version,
//! and edits to those requirements. [`CargoManifest`] implements it for
//! `Cargo.toml` files using `toml_edit`, so saving keeps the user's
//! formatting and comments.

use crate::error::{Error, Result};
use crate::version::Version;
use semver::{Op, VersionReq};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, InlineTable, Item, TableLike, Value};
use tracing::debug;

/// A declared dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Package identity.
    pub id: String,
    /// Lowest version the requirement accepts. `None` for path-only or
    /// workspace-inherited entries.
    pub version: Option<Version>,
}

/// A unit's dependency manifest.
pub trait Manifest: fmt::Debug {
    /// Location of the manifest file.
    fn path(&self) -> &Path;

    /// Declared package identity.
    fn name(&self) -> &str;

    /// Declared dependencies in file order.
    fn dependencies(&self) -> Vec<Dependency>;

    /// Require at least `version` of `id`, adding the entry if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest structure cannot hold the entry.
    fn add_or_bump_dependency(&mut self, id: &str, version: &Version) -> Result<()>;

    /// Point `id` at a local directory until [`Manifest::clear_path_overrides`].
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not declared.
    fn set_path_override(&mut self, id: &str, path: &Path) -> Result<()>;

    /// Drop every override added by [`Manifest::set_path_override`].
    /// Returns the affected dependency identities.
    fn clear_path_overrides(&mut self) -> Vec<String>;

    /// Persist the in-memory state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self) -> Result<()>;
}

/// Lowest version a Cargo requirement string accepts.
///
/// Only comparators that set a lower bound count, and missing components
/// are padded with zero: `"^1.2"` and `">=1.2, <2"` both give `1.2.0`.
/// Wildcards and upper-bound-only requirements such as `"<2"` yield `None`.
#[must_use]
pub fn requirement_floor(requirement: &str) -> Option<Version> {
    let req = VersionReq::parse(requirement.trim()).ok()?;
    req.comparators
        .iter()
        .filter(|c| lower_bound_operator(c.op))
        .map(|c| {
            let version = Version::new(c.major, c.minor.unwrap_or(0), c.patch.unwrap_or(0));
            if c.pre.is_empty() {
                version
            } else {
                version.with_prerelease(c.pre.as_str())
            }
        })
        .max()
}

const fn lower_bound_operator(op: Op) -> bool {
    matches!(
        op,
        Op::Exact | Op::Greater | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard
    )
}

/// `requirement` rewritten to accept `version` with the same operator.
///
/// `None` unless the requirement is a single comparator with a plain
/// operator; compound ranges and upper bounds are left to the user.
fn bumped_requirement(requirement: &str, version: &Version) -> Option<String> {
    let req = VersionReq::parse(requirement.trim()).ok()?;
    let [only] = req.comparators.as_slice() else {
        return None;
    };
    let operator = match only.op {
        Op::Caret if requirement.trim_start().starts_with('^') => "^",
        Op::Caret => "",
        Op::Exact => "=",
        Op::Greater => ">",
        Op::GreaterEq => ">=",
        Op::Tilde => "~",
        _ => return None,
    };
    Some(format!("{operator}{version}"))
}

const DEPENDENCIES: &str = "dependencies";

/// `Cargo.toml` of a single package.
pub struct CargoManifest {
    path: PathBuf,
    name: String,
    doc: DocumentMut,
    overrides: BTreeMap<String, Item>,
}

impl fmt::Debug for CargoManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CargoManifest")
            .field("path", &self.path)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CargoManifest {
    /// Read and parse the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or has
    /// no `[package].name`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::manifest(
                format!("Failed to read {}: {e}", path.display()),
                Some(path.to_path_buf()),
            )
        })?;
        Self::parse(path, &content)
    }

    /// Parse manifest text as if it had been read from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or has no
    /// `[package].name`.
    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let doc = content.parse::<DocumentMut>().map_err(|e| {
            Error::manifest(
                format!("Failed to parse {}: {e}", path.display()),
                Some(path.to_path_buf()),
            )
        })?;
        let name = doc
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(Item::as_str)
            .ok_or_else(|| {
                Error::manifest("No [package].name found", Some(path.to_path_buf()))
            })?
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            doc,
            overrides: BTreeMap::new(),
        })
    }

    /// The manifest as it would be saved.
    #[must_use]
    pub fn render(&self) -> String {
        self.doc.to_string()
    }

    fn dependency_table(&self) -> Option<&dyn TableLike> {
        self.doc.get(DEPENDENCIES).and_then(Item::as_table_like)
    }

    fn dependency_table_mut(&mut self) -> Result<&mut dyn TableLike> {
        if self.doc.get(DEPENDENCIES).is_none() {
            self.doc[DEPENDENCIES] = toml_edit::table();
        }
        let path = self.path.clone();
        self.doc
            .get_mut(DEPENDENCIES)
            .and_then(Item::as_table_like_mut)
            .ok_or_else(|| Error::manifest("[dependencies] is not a table", Some(path)))
    }

    /// Table key of the entry resolving to package `id`, honouring renames.
    fn entry_key(&self, id: &str) -> Option<String> {
        self.dependency_table()?
            .iter()
            .find(|(key, item)| entry_id(key, item) == id)
            .map(|(key, _)| key.to_string())
    }
}

fn entry_id<'a>(key: &'a str, item: &'a Item) -> &'a str {
    item.get("package").and_then(Item::as_str).unwrap_or(key)
}

fn entry_requirement(item: &Item) -> Option<&str> {
    item.as_str()
        .or_else(|| item.get("version").and_then(Item::as_str))
}

impl Manifest for CargoManifest {
    fn path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<Dependency> {
        let Some(table) = self.dependency_table() else {
            return Vec::new();
        };
        table
            .iter()
            .map(|(key, item)| Dependency {
                id: entry_id(key, item).to_string(),
                version: entry_requirement(item).and_then(requirement_floor),
            })
            .collect()
    }

    fn add_or_bump_dependency(&mut self, id: &str, version: &Version) -> Result<()> {
        let key = self.entry_key(id);
        let path = self.path.clone();
        let table = self.dependency_table_mut()?;

        let Some(key) = key else {
            table.insert(id, toml_edit::value(version.to_string()));
            debug!(manifest = %path.display(), dependency = id, %version, "dependency added");
            return Ok(());
        };

        let Some(item) = table.get_mut(&key) else {
            return Err(Error::manifest(format!("dependency {id} vanished"), Some(path)));
        };
        let requirement = match entry_requirement(item) {
            None => version.to_string(),
            Some(current) => bumped_requirement(current, version).ok_or_else(|| {
                Error::manifest(
                    format!(
                        "dependency {id} requires \"{current}\", which cannot be raised to {version} automatically"
                    ),
                    Some(path.clone()),
                )
            })?,
        };

        if item.is_str() {
            *item = toml_edit::value(requirement);
        } else if let Some(entry) = item.as_table_like_mut() {
            entry.insert("version", toml_edit::value(requirement));
        } else {
            return Err(Error::manifest(
                format!("dependency {id} has an unsupported shape"),
                Some(path),
            ));
        }
        debug!(manifest = %path.display(), dependency = id, %version, "dependency bumped");
        Ok(())
    }

    fn set_path_override(&mut self, id: &str, dir: &Path) -> Result<()> {
        let path = self.path.clone();
        let key = self.entry_key(id).ok_or_else(|| {
            Error::manifest(format!("dependency {id} is not declared"), Some(path.clone()))
        })?;
        let local = dir.to_string_lossy().into_owned();

        let table = self.dependency_table_mut()?;
        let Some(item) = table.get_mut(&key) else {
            return Err(Error::manifest(format!("dependency {id} vanished"), Some(path)));
        };
        let original = item.clone();

        if let Some(requirement) = item.as_str().map(str::to_string) {
            let mut inline = InlineTable::new();
            inline.insert("version", Value::from(requirement));
            inline.insert("path", Value::from(local));
            *item = Item::Value(Value::InlineTable(inline));
        } else if let Some(entry) = item.as_table_like_mut() {
            entry.insert("path", toml_edit::value(local));
        } else {
            return Err(Error::manifest(
                format!("dependency {id} has an unsupported shape"),
                Some(path),
            ));
        }

        self.overrides.entry(key).or_insert(original);
        Ok(())
    }

    fn clear_path_overrides(&mut self) -> Vec<String> {
        let overrides = std::mem::take(&mut self.overrides);
        let mut cleared = Vec::with_capacity(overrides.len());
        if let Some(table) = self
            .doc
            .get_mut(DEPENDENCIES)
            .and_then(Item::as_table_like_mut)
        {
            for (key, original) in overrides {
                let id = entry_id(&key, &original).to_string();
                table.insert(&key, original);
                cleared.push(id);
            }
        }
        cleared
    }

    fn save(&self) -> Result<()> {
        fs::write(&self.path, self.render()).map_err(|e| {
            Error::manifest(
                format!("Failed to write {}: {e}", self.path.display()),
                Some(self.path.clone()),
            )
        })
    }
}
