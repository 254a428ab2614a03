//! Release ordering over internal dependencies.

use crate::error::{Error, Result};
use crate::unit::Unit;
use monotag_task_graph::{Dependent, DependencyGraph};
use std::collections::HashMap;

#[derive(Debug)]
struct UnitNode {
    index: usize,
    internal_deps: Vec<String>,
}

impl Dependent for UnitNode {
    fn depends_on(&self) -> impl Iterator<Item = &str> {
        self.internal_deps.iter().map(String::as_str)
    }
}

/// Identities of the known units `unit` depends on.
#[must_use]
pub fn internal_dependencies(unit: &Unit, units: &[Unit]) -> Vec<String> {
    unit.dependencies()
        .into_iter()
        .map(|d| d.id)
        .filter(|id| units.iter().any(|u| &u.id == id))
        .collect()
}

/// Indices of `units` such that every unit comes after the units it
/// depends on. Units without a constraint between them are ordered by
/// identity.
///
/// # Errors
///
/// Returns [`Error::DependencyCycle`] naming every unit on a cycle. No
/// partial order is produced.
pub fn release_order(units: &[Unit]) -> Result<Vec<usize>> {
    let mut graph = DependencyGraph::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();

    for (index, unit) in units.iter().enumerate() {
        if let Some(first) = seen.insert(&unit.id, index) {
            return Err(Error::config(
                format!("unit {} is declared twice", unit.id),
                format!(
                    "{} and {} share a package name",
                    units[first].dir.display(),
                    unit.dir.display()
                ),
            ));
        }
        graph.insert(
            unit.id.clone(),
            UnitNode {
                index,
                internal_deps: internal_dependencies(unit, units),
            },
        );
    }

    graph
        .connect()
        .map_err(|e| Error::config(e.to_string(), "internal dependencies must name known units"))?;

    match graph.order() {
        Ok(nodes) => Ok(nodes.into_iter().map(|(_, node)| node.index).collect()),
        Err(monotag_task_graph::Error::Cycle { nodes }) => Err(Error::DependencyCycle { units: nodes }),
        Err(e) => Err(Error::config(e.to_string(), "check internal dependencies")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::tests::unit;

    fn ids(units: &[Unit], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| units[i].id.clone()).collect()
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        let units = vec![
            unit("a/", "a", &[("b", "0.1.0")]),
            unit("b/", "b", &[("c", "0.1.0")]),
            unit("c/", "c", &[]),
        ];
        let order = release_order(&units).unwrap();
        assert_eq!(ids(&units, &order), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_external_dependencies_ignored() {
        let units = vec![
            unit("web/", "web", &[("serde", "1.0.0"), ("api", "0.2.0")]),
            unit("api/", "api", &[("serde", "1.0.0")]),
            unit("cli/", "cli", &[]),
        ];
        let order = release_order(&units).unwrap();
        assert_eq!(ids(&units, &order), vec!["api", "cli", "web"]);
        assert_eq!(internal_dependencies(&units[0], &units), vec!["api"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let units = vec![
            unit("a/", "a", &[("b", "0.1.0")]),
            unit("b/", "b", &[("c", "0.1.0")]),
            unit("c/", "c", &[("a", "0.1.0")]),
            unit("d/", "d", &[]),
        ];
        match release_order(&units) {
            Err(Error::DependencyCycle { units }) => assert_eq!(units, vec!["a", "b", "c"]),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let units = vec![unit("a/", "same", &[]), unit("b/", "same", &[])];
        assert!(matches!(release_order(&units), Err(Error::Config { .. })));
    }
}
