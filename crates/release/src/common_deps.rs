//! Shared external dependencies and requirement convergence.

use crate::error::{Error, Result};
use crate::unit::Unit;
use crate::version::Version;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// An external dependency required by two or more units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommonDependency {
    /// Dependency identity.
    pub id: String,
    /// Lowest required version across units.
    pub min: Version,
    /// Highest required version across units.
    pub max: Version,
    /// Units requiring it, sorted.
    pub used_by: Vec<String>,
}

impl CommonDependency {
    /// Whether units disagree on the required version.
    #[must_use]
    pub fn drifted(&self) -> bool {
        self.min != self.max
    }
}

/// A requirement raised by [`converge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyBump {
    /// Unit whose manifest changed.
    pub unit: String,
    /// Dependency raised.
    pub dependency: String,
    /// New required version.
    pub version: Version,
}

/// Collect external dependencies with a version shared by two or more units,
/// sorted by identity. Dependencies on other units are not considered.
#[must_use]
pub fn common_dependencies(units: &[Unit]) -> Vec<CommonDependency> {
    let mut by_id: BTreeMap<String, CommonDependency> = BTreeMap::new();

    for unit in units {
        for dep in unit.dependencies() {
            let Some(version) = dep.version else {
                continue;
            };
            if units.iter().any(|u| u.id == dep.id) {
                continue;
            }
            let entry = by_id
                .entry(dep.id.clone())
                .or_insert_with(|| CommonDependency {
                    id: dep.id.clone(),
                    min: version.clone(),
                    max: version.clone(),
                    used_by: Vec::new(),
                });
            if version < entry.min {
                entry.min = version.clone();
            }
            if version > entry.max {
                entry.max = version;
            }
            if !entry.used_by.contains(&unit.id) {
                entry.used_by.push(unit.id.clone());
            }
        }
    }

    by_id
        .into_values()
        .filter(|dep| dep.used_by.len() >= 2)
        .map(|mut dep| {
            dep.used_by.sort();
            dep
        })
        .collect()
}

/// Raise every drifted requirement to its maximum in the units below it.
///
/// Only in-memory manifests change here; nothing is written to disk.
///
/// # Errors
///
/// Returns the first manifest edit failure, wrapped with the unit identity.
pub fn converge(units: &mut [Unit], common: &[CommonDependency]) -> Result<Vec<DependencyBump>> {
    let mut bumps = Vec::new();
    for dep in common.iter().filter(|d| d.drifted()) {
        for unit in units.iter_mut().filter(|u| dep.used_by.contains(&u.id)) {
            let raised = unit
                .bump_dependency(&dep.id, &dep.max)
                .map_err(|e| Error::unit(&unit.id, "update common dependency", e))?;
            if raised {
                info!(unit = %unit.id, dependency = %dep.id, version = %dep.max, "requirement raised");
                bumps.push(DependencyBump {
                    unit: unit.id.clone(),
                    dependency: dep.id.clone(),
                    version: dep.max.clone(),
                });
            }
        }
    }
    Ok(bumps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::tests::unit;
    use crate::version::ReleaseTag;

    fn units() -> Vec<Unit> {
        vec![
            unit("api/", "api", &[("serde", "1.0.100"), ("tokio", "1.40"), ("core", "0.2.0")]),
            unit("web/", "web", &[("serde", "1.0.150"), ("core", "0.2.0")]),
            unit("cli/", "cli", &[("serde", "1.0.150"), ("clap", "4")]),
            unit("core/", "core", &[("serde", "1.0.150")]),
        ]
    }

    #[test]
    fn test_common_dependencies() {
        let common = common_dependencies(&units());
        let ids: Vec<&str> = common.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["serde"]);

        let serde = &common[0];
        assert_eq!(serde.min, Version::new(1, 0, 100));
        assert_eq!(serde.max, Version::new(1, 0, 150));
        assert_eq!(serde.used_by, vec!["api", "cli", "core", "web"]);
        assert!(serde.drifted());
    }

    #[test]
    fn test_converge_raises_lower_requirements() {
        let mut units = units();
        for u in &mut units {
            u.state.last_tag = Some(ReleaseTag::parse(&u.tag_prefix, &format!("{}v1.0.0", u.tag_prefix)).unwrap());
        }
        let common = common_dependencies(&units);
        let bumps = converge(&mut units, &common).unwrap();

        assert_eq!(
            bumps,
            vec![DependencyBump {
                unit: "api".to_string(),
                dependency: "serde".to_string(),
                version: Version::new(1, 0, 150),
            }]
        );
        assert!(units[0].state.needs_release);
        assert!(units[0].update_deps);
        assert_eq!(units[0].state.next_tag.as_ref().unwrap().to_string(), "api/v1.0.1");
        assert!(!units[1].state.needs_release);
    }

    #[test]
    fn test_converge_without_drift_is_noop() {
        let mut units = vec![
            unit("a/", "a", &[("serde", "1.0.0")]),
            unit("b/", "b", &[("serde", "1.0.0")]),
        ];
        let common = common_dependencies(&units);
        assert_eq!(common.len(), 1);
        assert!(converge(&mut units, &common).unwrap().is_empty());
    }
}
