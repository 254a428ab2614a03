//! Property tests for dependency ordering and the runner.

use monotag_task_graph::{Dependent, DependencyGraph, Executor, Runner, TaskId, TaskResult};
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
struct Deps(Vec<String>);

impl Dependent for Deps {
    fn depends_on(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// `(name, deps)` pairs.
type Layout = Vec<(String, Vec<String>)>;

fn name(i: usize) -> String {
    format!("crate-{i:02}")
}

/// Acyclic layouts: node `i` may only depend on nodes `< i`.
fn acyclic(max: usize) -> impl Strategy<Value = Layout> {
    (1..=max).prop_flat_map(|len| {
        let per_node: Vec<_> = (0..len)
            .map(|i| proptest::collection::btree_set(0..i.max(1), 0..=i.min(3)))
            .collect();
        per_node.prop_map(move |sets| {
            sets.into_iter()
                .enumerate()
                .map(|(i, deps)| (name(i), deps.into_iter().filter(|&d| d < i).map(name).collect()))
                .collect()
        })
    })
}

fn build<'a>(layout: impl IntoIterator<Item = &'a (String, Vec<String>)>) -> DependencyGraph<Deps> {
    let mut graph = DependencyGraph::new();
    for (node, deps) in layout {
        graph.insert(node.clone(), Deps(deps.clone()));
    }
    graph.connect().unwrap();
    graph
}

fn order(graph: &DependencyGraph<Deps>) -> Vec<String> {
    graph
        .order()
        .unwrap()
        .into_iter()
        .map(|(n, _)| n.to_string())
        .collect()
}

proptest! {
    #[test]
    fn dependencies_come_first(layout in acyclic(16)) {
        let sorted = order(&build(&layout));
        prop_assert_eq!(sorted.len(), layout.len());
        let position: HashMap<&str, usize> =
            sorted.iter().enumerate().map(|(i, n)| (n.as_str(), i)).collect();
        for (node, deps) in &layout {
            for dep in deps {
                prop_assert!(position[dep.as_str()] < position[node.as_str()]);
            }
        }
    }

    #[test]
    fn insertion_order_does_not_matter(layout in acyclic(16)) {
        prop_assert_eq!(order(&build(&layout)), order(&build(layout.iter().rev())));
    }

    #[test]
    fn cycle_reports_exactly_its_members(len in 1_usize..8, hangers in 0_usize..4) {
        let mut layout: Layout = (0..len)
            .map(|i| (format!("ring-{i}"), vec![format!("ring-{}", (i + 1) % len)]))
            .collect();
        layout.extend((0..hangers).map(|i| (format!("leaf-{i}"), vec!["ring-0".to_string()])));

        let graph = build(&layout);
        let mut ring: Vec<String> = (0..len).map(|i| format!("ring-{i}")).collect();
        ring.sort();
        prop_assert_eq!(graph.cycle(), ring.clone());
        match graph.order() {
            Err(monotag_task_graph::Error::Cycle { nodes }) => prop_assert_eq!(nodes, ring),
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|o| o.len())),
        }
    }

    #[test]
    fn runner_honours_predecessors(layout in acyclic(12)) {
        let mut runner: Runner<Vec<String>> = Runner::new("prop");
        let mut ids: HashMap<&str, TaskId> = HashMap::new();
        for (node, deps) in &layout {
            let after: Vec<TaskId> = deps.iter().map(|d| ids[d.as_str()]).collect();
            let label = node.clone();
            let id = runner.add_after(&after, node.clone(), move |ex: &mut Executor<'_, Vec<String>>| {
                ex.ctx().push(label);
                TaskResult::success("ran")
            });
            ids.insert(node, id);
        }

        let mut ran = Vec::new();
        prop_assert!(runner.run(&mut ran).is_success());
        prop_assert_eq!(ran.len(), layout.len());

        let deps: HashMap<&str, &Vec<String>> = layout.iter().map(|(n, d)| (n.as_str(), d)).collect();
        let mut done = HashSet::new();
        for node in &ran {
            for dep in deps[node.as_str()] {
                prop_assert!(done.contains(dep));
            }
            done.insert(node.clone());
        }
    }
}
