//! Dependency graph over named nodes, backed by petgraph.
//!
//! An edge runs from a dependency to its dependent. Ordering is Kahn's
//! algorithm with ties broken by name, so the same set of nodes always
//! yields the same order whatever the insertion order was.

use crate::{Dependent, Error, Result};
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, trace};

#[derive(Debug)]
struct Node<T> {
    name: String,
    data: T,
}

/// Directed dependency graph.
#[derive(Debug)]
pub struct DependencyGraph<T> {
    graph: DiGraph<Node<T>, ()>,
    index: HashMap<String, NodeIndex>,
}

impl<T: Dependent> DependencyGraph<T> {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a node. Returns `false`, keeping the first data, when `name`
    /// is already present.
    pub fn insert(&mut self, name: impl Into<String>, data: T) -> bool {
        let name = name.into();
        if self.index.contains_key(&name) {
            return false;
        }
        trace!(node = %name, "graph node inserted");
        let idx = self.graph.add_node(Node {
            name: name.clone(),
            data,
        });
        self.index.insert(name, idx);
        true
    }

    /// Node data by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&T> {
        self.index.get(name).map(|&idx| &self.graph[idx].data)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Turn every node's declared dependencies into edges. Call once all
    /// nodes are inserted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDependencies`] listing every dangling name;
    /// the graph is left without the new edges.
    pub fn connect(&mut self) -> Result<()> {
        let mut edges = Vec::new();
        let mut missing = Vec::new();
        for idx in self.graph.node_indices() {
            let node = &self.graph[idx];
            for dep in node.data.depends_on() {
                match self.index.get(dep) {
                    Some(&from) => edges.push((from, idx)),
                    None => missing.push((node.name.clone(), dep.to_string())),
                }
            }
        }
        if !missing.is_empty() {
            return Err(Error::UnknownDependencies { missing });
        }
        for (from, to) in edges {
            self.graph.update_edge(from, to, ());
        }
        debug!(nodes = self.len(), edges = self.graph.edge_count(), "graph connected");
        Ok(())
    }

    /// Every node lying on a cycle, self-loops included, sorted by name.
    /// Empty for an acyclic graph.
    #[must_use]
    pub fn cycle(&self) -> Vec<String> {
        let mut names = Vec::new();
        for component in tarjan_scc(&self.graph) {
            let looped = match component.as_slice() {
                [single] => self.graph.contains_edge(*single, *single),
                _ => true,
            };
            if looped {
                names.extend(component.into_iter().map(|idx| self.graph[idx].name.clone()));
            }
        }
        names.sort();
        names
    }

    /// Node names and data, every node after the nodes it depends on.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cycle`] naming every node on a cycle. No partial
    /// order is produced.
    pub fn order(&self) -> Result<Vec<(&str, &T)>> {
        let mut pending: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.edges_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<(&str, NodeIndex)>> = self
            .graph
            .node_indices()
            .filter(|idx| pending[idx.index()] == 0)
            .map(|idx| Reverse((self.graph[idx].name.as_str(), idx)))
            .collect();

        let mut out = Vec::with_capacity(self.len());
        while let Some(Reverse((name, idx))) = ready.pop() {
            out.push((name, &self.graph[idx].data));
            for next in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let left = &mut pending[next.index()];
                *left -= 1;
                if *left == 0 {
                    ready.push(Reverse((self.graph[next].name.as_str(), next)));
                }
            }
        }

        if out.len() < self.len() {
            return Err(Error::Cycle {
                nodes: self.cycle(),
            });
        }
        Ok(out)
    }

    /// Names of the nodes that depend directly on `name`, sorted.
    #[must_use]
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].name.as_str())
            .collect();
        out.sort_unstable();
        out
    }
}

impl<T: Dependent> Default for DependencyGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}
