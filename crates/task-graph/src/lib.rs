//! Ordering and step execution for monotag.
//!
//! - [`DependencyGraph`] orders named nodes so every node follows the
//!   nodes it depends on, and names every node of a cycle when there is
//!   no such order. Releases use it to put units after their internal
//!   dependencies.
//! - [`Runner`] executes named steps one at a time. A step may run after
//!   other steps, spawn subtasks while it runs, and be critical, in which
//!   case its failure halts every step not yet started. Each step returns a
//!   tiered [`TaskResult`] and the run ends in a [`Report`].
//!
//! ```
//! use monotag_task_graph::{Dependent, DependencyGraph, Executor, Runner, TaskResult};
//!
//! struct Package(Vec<&'static str>);
//!
//! impl Dependent for Package {
//!     fn depends_on(&self) -> impl Iterator<Item = &str> {
//!         self.0.iter().map(|d| &**d)
//!     }
//! }
//!
//! let mut graph = DependencyGraph::new();
//! graph.insert("app", Package(vec!["core"]));
//! graph.insert("core", Package(vec![]));
//! graph.connect().unwrap();
//! let order: Vec<&str> = graph.order().unwrap().into_iter().map(|(name, _)| name).collect();
//! assert_eq!(order, ["core", "app"]);
//!
//! let mut runner: Runner<Vec<String>> = Runner::new("release");
//! for name in order {
//!     let name = name.to_string();
//!     runner.add(name.clone(), move |ex: &mut Executor<'_, Vec<String>>| {
//!         ex.ctx().push(name);
//!         TaskResult::success("tagged")
//!     });
//! }
//! let mut tagged = Vec::new();
//! assert!(runner.run(&mut tagged).is_success());
//! assert_eq!(tagged, ["core", "app"]);
//! ```

mod error;
mod graph;
mod report;
mod result;
mod runner;

pub use error::{Error, Result};
pub use graph::DependencyGraph;
pub use report::{Report, ReportEntry};
pub use result::{Outcome, TaskResult};
pub use runner::{Executor, Runner, TaskId};

/// A graph node that names the nodes it depends on.
pub trait Dependent {
    /// Names of the nodes this one depends on.
    fn depends_on(&self) -> impl Iterator<Item = &str>;
}
