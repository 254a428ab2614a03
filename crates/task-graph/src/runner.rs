//! Sequential step executor.
//!
//! A [`Runner`] holds named steps, each a closure returning a [`TaskResult`].
//! Steps declare predecessor [`TaskId`]s at registration time, and a running
//! step may spawn subtasks through its [`Executor`]. Subtasks are scheduled
//! right after their parent, ahead of later top-level steps, so a parent's
//! fan-out reads as one block in the report.
//!
//! Steps are never skipped automatically when a predecessor fails; each step
//! decides its own policy via [`Executor::dependency_failed`]. The only
//! exception is a step registered as critical: when it fails, nothing that
//! has not started yet will run.
//!
//! Shared state lives in the run context `C`, handed to every step as
//! `&mut C`. Execution is single-threaded, so no locking is involved.

use crate::report::{Report, ReportEntry};
use crate::{Error, TaskResult};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// Identity of a registered task, usable as a predecessor of later tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

type TaskFn<C> = Box<dyn FnOnce(&mut Executor<'_, C>) -> TaskResult>;

struct Slot<C> {
    name: String,
    deps: Vec<TaskId>,
    parent: Option<TaskId>,
    critical: bool,
    func: Option<TaskFn<C>>,
    result: Option<TaskResult>,
}

impl<C> Slot<C> {
    fn new(name: String, deps: Vec<TaskId>, parent: Option<TaskId>, func: TaskFn<C>) -> Self {
        Self {
            name,
            deps,
            parent,
            critical: false,
            func: Some(func),
            result: None,
        }
    }

    fn is_done(&self) -> bool {
        self.result.is_some()
    }
}

/// Registry and scheduler of tasks over a run context `C`.
pub struct Runner<C> {
    name: String,
    slots: Vec<Slot<C>>,
    schedule: Vec<TaskId>,
}

impl<C> Runner<C> {
    /// Create an empty runner.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            schedule: Vec::new(),
        }
    }

    /// Register a task without predecessors.
    pub fn add<F>(&mut self, name: impl Into<String>, func: F) -> TaskId
    where
        F: FnOnce(&mut Executor<'_, C>) -> TaskResult + 'static,
    {
        self.add_after(&[], name, func)
    }

    /// Register a task that runs only after every task in `deps` completed.
    pub fn add_after<F>(&mut self, deps: &[TaskId], name: impl Into<String>, func: F) -> TaskId
    where
        F: FnOnce(&mut Executor<'_, C>) -> TaskResult + 'static,
    {
        let id = TaskId(self.slots.len());
        self.slots
            .push(Slot::new(name.into(), deps.to_vec(), None, Box::new(func)));
        self.schedule.push(id);
        id
    }

    /// Register a task whose failure halts every task not yet started.
    pub fn add_critical_after<F>(
        &mut self,
        deps: &[TaskId],
        name: impl Into<String>,
        func: F,
    ) -> TaskId
    where
        F: FnOnce(&mut Executor<'_, C>) -> TaskResult + 'static,
    {
        let id = self.add_after(deps, name, func);
        self.slots[id.0].critical = true;
        id
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no task has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Execute every task in dependency order and return the report.
    ///
    /// All independent branches run even after failures, so the report is
    /// complete; use [`Report::ensure_success`] to turn it into an error.
    pub fn run(mut self, ctx: &mut C) -> Report {
        let mut report = Report::new(&self.name);
        let mut halted_by: Option<String> = None;

        while let Some(pos) = self.next_ready() {
            let id = self.schedule[pos];

            if let Some(cause) = &halted_by {
                let result = TaskResult::skip("not started")
                    .with_desc(format!("halted after '{cause}' failed"));
                self.finish(id, result, &mut report);
                continue;
            }

            let result = if let Some(unknown) = self.unknown_dependency(id) {
                let err = Error::UnknownTask {
                    task: self.slots[id.0].name.clone(),
                    dependency: unknown.0,
                };
                TaskResult::failure("invalid task registration").with_desc(err.to_string())
            } else {
                let spawned = self.execute(id, ctx);
                let result = spawned.0;
                let children: Vec<TaskId> = spawned
                    .1
                    .into_iter()
                    .map(|slot| {
                        let child = TaskId(self.slots.len());
                        self.slots.push(slot);
                        child
                    })
                    .collect();
                let at = pos + 1;
                self.schedule.splice(at..at, children);
                result
            };

            if result.is_failure() && self.slots[id.0].critical {
                warn!(task = %self.slots[id.0].name, "critical task failed, halting run");
                halted_by = Some(self.slots[id.0].name.clone());
            }
            self.finish(id, result, &mut report);
        }

        report
    }

    fn next_ready(&self) -> Option<usize> {
        self.schedule.iter().position(|id| {
            let slot = &self.slots[id.0];
            !slot.is_done()
                && slot
                    .deps
                    .iter()
                    .all(|dep| self.slots.get(dep.0).is_none_or(Slot::is_done))
        })
    }

    fn unknown_dependency(&self, id: TaskId) -> Option<TaskId> {
        self.slots[id.0]
            .deps
            .iter()
            .copied()
            .find(|dep| dep.0 >= self.slots.len())
    }

    fn execute(&mut self, id: TaskId, ctx: &mut C) -> (TaskResult, Vec<Slot<C>>) {
        let Some(func) = self.slots[id.0].func.take() else {
            return (TaskResult::failure("task already executed"), Vec::new());
        };
        debug!(task = %self.slots[id.0].name, id = %id, "running task");

        let mut executor = Executor {
            ctx,
            current: id,
            slots: &self.slots,
            spawned: Vec::new(),
        };
        let result = func(&mut executor);
        (result, executor.spawned)
    }

    fn finish(&mut self, id: TaskId, result: TaskResult, report: &mut Report) {
        let slot = &self.slots[id.0];
        debug!(
            task = %slot.name,
            outcome = %result.outcome,
            message = %result.message,
            "task finished"
        );

        let mut depth = 0;
        let mut parent = slot.parent;
        while let Some(p) = parent {
            depth += 1;
            parent = self.slots[p.0].parent;
        }

        report.push(ReportEntry {
            id,
            name: slot.name.clone(),
            parent: slot.parent,
            depth,
            result: result.clone(),
        });
        self.slots[id.0].result = Some(result);
    }
}

/// Handle given to a running task.
///
/// Grants mutable access to the run context, read access to the results of
/// already completed tasks, and the ability to spawn subtasks.
pub struct Executor<'a, C> {
    ctx: &'a mut C,
    current: TaskId,
    slots: &'a [Slot<C>],
    spawned: Vec<Slot<C>>,
}

impl<C> Executor<'_, C> {
    /// The shared run context.
    pub fn ctx(&mut self) -> &mut C {
        self.ctx
    }

    /// Identity of the running task.
    #[must_use]
    pub fn id(&self) -> TaskId {
        self.current
    }

    /// Name of the running task.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.slots[self.current.0].name
    }

    /// Result of a completed task, if it has run.
    #[must_use]
    pub fn result_of(&self, id: TaskId) -> Option<&TaskResult> {
        self.slots.get(id.0).and_then(|slot| slot.result.as_ref())
    }

    /// Whether any declared predecessor of the running task failed.
    #[must_use]
    pub fn dependency_failed(&self) -> bool {
        self.slots[self.current.0]
            .deps
            .iter()
            .any(|&dep| self.result_of(dep).is_some_and(TaskResult::is_failure))
    }

    /// Whether any task completed so far in this run failed.
    #[must_use]
    pub fn any_failed(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.result.as_ref().is_some_and(TaskResult::is_failure))
    }

    /// Spawn a subtask of the running task.
    pub fn subtask<F>(&mut self, name: impl Into<String>, func: F) -> TaskId
    where
        F: FnOnce(&mut Executor<'_, C>) -> TaskResult + 'static,
    {
        self.subtask_after(&[], name, func)
    }

    /// Spawn a subtask that waits for `deps`, which may include subtasks
    /// spawned earlier by the same task.
    pub fn subtask_after<F>(&mut self, deps: &[TaskId], name: impl Into<String>, func: F) -> TaskId
    where
        F: FnOnce(&mut Executor<'_, C>) -> TaskResult + 'static,
    {
        let id = TaskId(self.slots.len() + self.spawned.len());
        self.spawned.push(Slot::new(
            name.into(),
            deps.to_vec(),
            Some(self.current),
            Box::new(func),
        ));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Outcome;

    #[derive(Default)]
    struct Trace {
        order: Vec<String>,
        failed: bool,
    }

    fn record(name: &'static str) -> impl FnOnce(&mut Executor<'_, Trace>) -> TaskResult {
        move |ex| {
            ex.ctx().order.push(name.to_string());
            TaskResult::success(name)
        }
    }

    #[test]
    fn test_independent_tasks_run_in_insertion_order() {
        let mut runner = Runner::new("test");
        runner.add("b", record("b"));
        runner.add("a", record("a"));
        runner.add("c", record("c"));

        let mut trace = Trace::default();
        let report = runner.run(&mut trace);
        assert_eq!(trace.order, vec!["b", "a", "c"]);
        assert!(report.is_success());
        assert_eq!(report.entries().len(), 3);
    }

    #[test]
    fn test_dependencies_run_first() {
        let mut runner = Runner::new("test");
        let first = runner.add("first", record("first"));
        let second = runner.add_after(&[first], "second", record("second"));
        runner.add_after(&[second, first], "third", record("third"));

        let mut trace = Trace::default();
        runner.run(&mut trace);
        assert_eq!(trace.order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_subtasks_run_before_later_siblings() {
        let mut runner = Runner::new("test");
        runner.add("parent", |ex: &mut Executor<'_, Trace>| {
            ex.ctx().order.push("parent".to_string());
            let one = ex.subtask("child-1", record("child-1"));
            ex.subtask_after(&[one], "child-2", record("child-2"));
            TaskResult::success("spawned")
        });
        runner.add("sibling", record("sibling"));

        let mut trace = Trace::default();
        let report = runner.run(&mut trace);
        assert_eq!(trace.order, vec!["parent", "child-1", "child-2", "sibling"]);

        let child = &report.entries()[1];
        assert_eq!(child.name, "child-1");
        assert_eq!(child.depth, 1);
        assert!(child.parent.is_some());
    }

    #[test]
    fn test_nested_subtasks_depth() {
        let mut runner = Runner::new("test");
        runner.add("root", |ex: &mut Executor<'_, Trace>| {
            ex.subtask("mid", |ex: &mut Executor<'_, Trace>| {
                ex.subtask("leaf", record("leaf"));
                TaskResult::success("mid")
            });
            TaskResult::success("root")
        });

        let report = runner.run(&mut Trace::default());
        let depths: Vec<usize> = report.entries().iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 2]);
    }

    #[test]
    fn test_failure_does_not_short_circuit_independent_branches() {
        let mut runner = Runner::new("test");
        let bad = runner.add("bad", |_ex: &mut Executor<'_, Trace>| {
            TaskResult::failure("boom")
        });
        runner.add_after(&[bad], "dependent", |ex: &mut Executor<'_, Trace>| {
            if ex.dependency_failed() {
                ex.ctx().failed = true;
                return TaskResult::skip("dependency failed");
            }
            TaskResult::success("ran")
        });
        runner.add("independent", record("independent"));

        let mut trace = Trace::default();
        let report = runner.run(&mut trace);
        assert!(trace.failed);
        assert_eq!(trace.order, vec!["independent"]);
        assert!(!report.is_success());
        assert_eq!(report.failures().count(), 1);

        let err = report.ensure_success().unwrap_err();
        assert!(err.to_string().contains("bad: boom"));
    }

    #[test]
    fn test_critical_failure_halts_remaining_tasks() {
        let mut runner = Runner::new("test");
        let gate = runner.add_critical_after(&[], "gate", |_ex: &mut Executor<'_, Trace>| {
            TaskResult::failure("rejected")
        });
        runner.add_after(&[gate], "after", record("after"));
        runner.add("unrelated", record("unrelated"));

        let mut trace = Trace::default();
        let report = runner.run(&mut trace);
        assert!(trace.order.is_empty());

        let outcomes: Vec<Outcome> = report.entries().iter().map(|e| e.result.outcome).collect();
        assert_eq!(outcomes, vec![Outcome::Failure, Outcome::Skip, Outcome::Skip]);
        assert!(
            report.entries()[1]
                .result
                .description
                .as_deref()
                .is_some_and(|d| d.contains("gate"))
        );
    }

    #[test]
    fn test_unknown_dependency_fails_task() {
        let mut other: Runner<Trace> = Runner::new("other");
        for i in 0..5 {
            other.add(format!("t{i}"), record("x"));
        }
        let foreign = other.add("foreign", record("foreign"));

        let mut runner = Runner::new("test");
        runner.add_after(&[foreign], "orphan", record("orphan"));

        let report = runner.run(&mut Trace::default());
        assert!(!report.is_success());
        assert_eq!(report.entries()[0].result.message, "invalid task registration");
    }

    #[test]
    fn test_result_of_previous_task() {
        let mut runner = Runner::new("test");
        let first = runner.add("first", |_ex: &mut Executor<'_, Trace>| {
            TaskResult::info("hello")
        });
        runner.add_after(&[first], "second", move |ex: &mut Executor<'_, Trace>| {
            let msg = ex.result_of(first).map(|r| r.message.clone()).unwrap_or_default();
            TaskResult::success(msg)
        });

        let report = runner.run(&mut Trace::default());
        assert_eq!(report.entries()[1].result.message, "hello");
    }
}
