//! Release orchestrator.
//!
//! Composes the release pipeline on a [`Runner`]: precondition gate, lint
//! and test fan-out, pending commit, per-unit metadata load, dependency
//! sort, common-dependency convergence, confirmation, per-unit tag
//! lineages, release notes and finalize.
//!
//! Structural steps (preconditions, sort, confirmation) are critical: their
//! failure halts every step not yet started. Per-unit failures only mark
//! the run as failed and are contained to the unit's own lineage and the
//! units that depend on it.

use crate::changelog::{ReleaseNotes, UnitNotes};
use crate::checks::run_check;
use crate::common_deps::{CommonDependency, common_dependencies, converge};
use crate::config::{CheckConfig, ReleaseConfig, ReleaseOptions};
use crate::confirm::Confirm;
use crate::conventional::HistoryClassifier;
use crate::error::{Error, Result};
use crate::loader::{LoadSettings, load_unit};
use crate::resolver::release_order;
use crate::tagging::spawn_lineage;
use crate::unit::{ReleaseState, Unit};
use crate::vcs::Vcs;
use crate::workspace::nested_dirs;
use chrono::{DateTime, Utc};
use monotag_task_graph::{Report, Runner, TaskId, TaskResult};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// External capabilities the release pipeline drives.
pub struct Collaborators {
    /// Version control.
    pub vcs: Box<dyn Vcs>,
    /// Change history classification.
    pub history: Box<dyn HistoryClassifier>,
    /// Confirmation gate.
    pub confirm: Box<dyn Confirm>,
}

/// State shared by every task of one run.
pub(crate) struct ReleaseContext {
    pub(crate) root: PathBuf,
    pub(crate) config: ReleaseConfig,
    pub(crate) options: ReleaseOptions,
    pub(crate) vcs: Box<dyn Vcs>,
    pub(crate) history: Box<dyn HistoryClassifier>,
    pub(crate) confirm: Box<dyn Confirm>,
    pub(crate) units: Vec<Unit>,
    pub(crate) order: Vec<usize>,
    pub(crate) common: Vec<CommonDependency>,
    pub(crate) failed: bool,
    pub(crate) failed_units: BTreeSet<usize>,
    pub(crate) date: DateTime<Utc>,
    pub(crate) notes: Option<PathBuf>,
}

impl ReleaseContext {
    pub(crate) fn fail_unit(&mut self, index: usize) {
        self.failed = true;
        self.failed_units.insert(index);
    }

    fn dist(&self) -> PathBuf {
        self.root.join(&self.config.releaser.dist)
    }

    fn root_name(&self) -> String {
        self.root
            .file_name()
            .map_or_else(|| "release".to_string(), |n| n.to_string_lossy().into_owned())
    }

    fn load_settings(&self) -> LoadSettings {
        LoadSettings {
            remote: self.config.git.remote_name.clone(),
            baseline: self.config.releaser.baseline.clone(),
            version_file: self.config.releaser.version_file.clone(),
            skip_remote_checks: self.options.skip_remote_checks,
        }
    }

    fn nested_dirs(&self, index: usize) -> Vec<PathBuf> {
        let prefixes: Vec<&str> = self.units.iter().map(|u| u.tag_prefix.as_str()).collect();
        nested_dirs(&self.units[index].tag_prefix, &prefixes)
    }

    fn unit_names(&self) -> Vec<(usize, String)> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, u)| (i, u.name().to_string()))
            .collect()
    }
}

/// Outcome of [`ReleaseOrchestrator::release`].
pub struct ReleaseRun {
    /// One result per executed step, subtasks included.
    pub report: Report,
    /// Units with their final release state.
    pub units: Vec<Unit>,
    /// Release notes file, when one was written.
    pub notes: Option<PathBuf>,
}

impl ReleaseRun {
    /// Fail if any step failed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Failed`] naming the first failure.
    pub fn ensure_success(&self) -> Result<()> {
        Ok(self.report.ensure_success()?)
    }
}

/// Release state of one unit as shown by [`ReleasePlan`].
#[derive(Debug, Clone, Serialize)]
pub struct UnitStatus {
    /// Unit identity.
    pub id: String,
    /// Tag prefix, empty for the root.
    pub tag_prefix: String,
    /// Never tagged.
    pub internal: bool,
    /// Loaded release facts.
    #[serde(flatten)]
    pub state: ReleaseState,
    /// `last -> next` summary.
    pub transition: String,
    /// Number of classified changes.
    pub changes: usize,
}

impl UnitStatus {
    fn label(&self) -> &'static str {
        if self.internal {
            "internal"
        } else if self.state.pending_release {
            "pending"
        } else if self.state.needs_release {
            "release"
        } else {
            "current"
        }
    }
}

impl From<&Unit> for UnitStatus {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id.clone(),
            tag_prefix: unit.tag_prefix.clone(),
            internal: unit.internal,
            state: unit.state.clone(),
            transition: unit.transition(),
            changes: unit.changelog.len(),
        }
    }
}

/// Read-only view of what a release would do, in release order.
#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlan {
    /// Units in release order.
    pub units: Vec<UnitStatus>,
    /// External dependencies shared by two or more units.
    pub common: Vec<CommonDependency>,
}

impl fmt::Display for ReleasePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.units.iter().map(|u| u.id.len()).max().unwrap_or(0);
        for unit in &self.units {
            writeln!(
                f,
                "{:<width$}  {:<8}  {} ({} changes)",
                unit.id,
                unit.label(),
                unit.transition,
                unit.changes
            )?;
        }
        for dep in self.common.iter().filter(|d| d.drifted()) {
            writeln!(
                f,
                "drift: {} {}..{} ({})",
                dep.id,
                dep.min,
                dep.max,
                dep.used_by.join(", ")
            )?;
        }
        Ok(())
    }
}

/// Release orchestrator.
///
/// Owns the units and collaborators of one run.
pub struct ReleaseOrchestrator {
    ctx: ReleaseContext,
}

impl ReleaseOrchestrator {
    /// Create an orchestrator for the repository at `root`.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        config: ReleaseConfig,
        units: Vec<Unit>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            ctx: ReleaseContext {
                root: root.into(),
                config,
                options: ReleaseOptions::default(),
                vcs: collaborators.vcs,
                history: collaborators.history,
                confirm: collaborators.confirm,
                units,
                order: Vec::new(),
                common: Vec::new(),
                failed: false,
                failed_units: BTreeSet::new(),
                date: Utc::now(),
                notes: None,
            },
        }
    }

    /// Sets the runtime switches.
    #[must_use]
    pub fn with_options(mut self, options: ReleaseOptions) -> Self {
        self.ctx.options = options;
        self
    }

    /// Sets the date printed in the release notes.
    #[must_use]
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.ctx.date = date;
        self
    }

    /// Run the release pipeline.
    ///
    /// Step failures do not make this return an error; they are recorded in
    /// the report. See [`ReleaseRun::ensure_success`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when releases are disabled.
    pub fn release(self) -> Result<ReleaseRun> {
        self.ctx.config.ensure_releases_enabled()?;
        let runner = pipeline();
        let mut ctx = self.ctx;
        info!(units = ctx.units.len(), steps = runner.len(), "starting release");
        let report = runner.run(&mut ctx);
        Ok(ReleaseRun {
            report,
            units: ctx.units,
            notes: ctx.notes,
        })
    }

    /// Load release metadata and order the units without changing anything.
    ///
    /// # Errors
    ///
    /// Returns the first unit's load failure, wrapped with its identity, or
    /// a dependency cycle.
    pub fn plan(mut self) -> Result<ReleasePlan> {
        let settings = self.ctx.load_settings();
        for index in 0..self.ctx.units.len() {
            let nested = self.ctx.nested_dirs(index);
            let ReleaseContext {
                units,
                vcs,
                history,
                ..
            } = &mut self.ctx;
            let unit = &mut units[index];
            if let Err(e) = load_unit(unit, &**vcs, &**history, &nested, &settings) {
                return Err(Error::unit(&unit.id, "load release metadata", e));
            }
        }

        let units = &self.ctx.units;
        let order = release_order(units)?;
        Ok(ReleasePlan {
            units: order.iter().map(|&i| UnitStatus::from(&units[i])).collect(),
            common: common_dependencies(units),
        })
    }
}

fn pipeline() -> Runner<ReleaseContext> {
    let mut runner = Runner::new("release");
    let ready = preconditions(&mut runner);
    let linted = check_stage(&mut runner, ready, CheckKind::Lint);
    let tested = check_stage(&mut runner, linted, CheckKind::Test);
    let committed = commit_pending(&mut runner, tested);
    let loaded = load_metadata(&mut runner, committed);
    let sorted = sort_units(&mut runner, loaded);
    let converged = common_deps(&mut runner, sorted);
    let confirmed = confirm_release(&mut runner, converged);
    let tagged = tag_units(&mut runner, confirmed);
    let noted = write_changelog(&mut runner, tagged);
    finalize(&mut runner, noted);
    runner
}

fn preconditions(runner: &mut Runner<ReleaseContext>) -> TaskId {
    let clean = runner.add_critical_after(&[], "starting releaser", |ex| {
        let ctx = ex.ctx();
        if !ctx.vcs.is_dirty(&ctx.root) {
            return TaskResult::success("repository clean");
        }
        if ctx.options.allow_dirty {
            TaskResult::notice("repository is dirty")
        } else {
            TaskResult::failure("repository is dirty").with_desc("commit or stash pending changes")
        }
    });

    let branch = runner.add_critical_after(&[clean], "checking git branch", |ex| {
        let ctx = ex.ctx();
        let expected = &ctx.config.git.branch;
        match ctx.vcs.current_branch() {
            Ok(current) if &current == expected => TaskResult::success("ok").with_desc(current),
            Ok(current) => {
                TaskResult::failure(format!("expected branch {expected}, got {current}"))
            }
            Err(e) => TaskResult::failure(e.to_string()),
        }
    });

    let remote = runner.add_critical_after(&[branch], "checking git remote", |ex| {
        let ctx = ex.ctx();
        let git = &ctx.config.git;
        let (name, url) = match ctx.vcs.current_remote() {
            Ok(remote) => remote,
            Err(e) => return TaskResult::failure(e.to_string()),
        };
        if let Some(expected) = &git.remote_url
            && expected != &url
        {
            return TaskResult::failure(format!("expected remote {expected}, got {url}"));
        }
        if name != git.remote_name {
            return TaskResult::failure(format!(
                "expected remote name {}, got {name}",
                git.remote_name
            ));
        }
        TaskResult::success("ok").with_desc(format!("{name} {url}"))
    });

    runner.add_critical_after(&[remote], "checking dist dir", |ex| {
        let dist = ex.ctx().dist();
        let desc = dist.display().to_string();
        if dist.is_dir() {
            return TaskResult::success("ok").with_desc(desc);
        }
        if dist.exists() {
            return TaskResult::failure("dist is not a directory").with_desc(desc);
        }
        match fs::create_dir_all(&dist) {
            Ok(()) => TaskResult::success("created").with_desc(desc),
            Err(e) => TaskResult::failure(e.to_string()).with_desc(desc),
        }
    })
}

#[derive(Debug, Clone, Copy)]
enum CheckKind {
    Lint,
    Test,
}

impl CheckKind {
    const fn stage(self) -> &'static str {
        match self {
            Self::Lint => "linting",
            Self::Test => "testing",
        }
    }

    const fn step(self) -> &'static str {
        match self {
            Self::Lint => "lint",
            Self::Test => "test",
        }
    }

    const fn config(self, config: &ReleaseConfig) -> &CheckConfig {
        match self {
            Self::Lint => &config.linter,
            Self::Test => &config.tests,
        }
    }
}

fn check_stage(runner: &mut Runner<ReleaseContext>, dep: TaskId, kind: CheckKind) -> TaskId {
    runner.add_after(&[dep], kind.stage(), move |ex| {
        let (enabled, targets) = {
            let ctx = ex.ctx();
            (kind.config(&ctx.config).enabled, ctx.unit_names())
        };
        let count = targets.len();
        for (index, name) in targets {
            ex.subtask(format!("{name}: {}", kind.step()), move |ex| {
                run_unit_check(ex.ctx(), index, kind)
            });
        }
        if enabled {
            TaskResult::success(format!("running {} in {count} units", kind.step()))
        } else {
            TaskResult::skip(format!("{} disabled", kind.step()))
        }
    })
}

fn run_unit_check(ctx: &mut ReleaseContext, index: usize, kind: CheckKind) -> TaskResult {
    let check = kind.config(&ctx.config);
    let unit = &ctx.units[index];
    if !check.enabled {
        return TaskResult::skip(format!("{} disabled", kind.step())).with_desc(unit.id.clone());
    }
    match run_check(&check.command, &unit.dir) {
        Ok(()) => TaskResult::success(format!("{} passed", kind.step())).with_desc(unit.id.clone()),
        Err(e) => {
            let desc = Error::unit(&unit.id, kind.step(), e).to_string();
            ctx.fail_unit(index);
            TaskResult::failure(format!("{} failed", kind.step())).with_desc(desc)
        }
    }
}

fn commit_pending(runner: &mut Runner<ReleaseContext>, dep: TaskId) -> TaskId {
    runner.add_after(&[dep], "commit", |ex| {
        let ctx = ex.ctx();
        if !ctx.vcs.is_dirty(&ctx.root) {
            return TaskResult::skip("clean");
        }
        let message = format!("chore({}): prepare release", ctx.root_name());
        match ctx.vcs.commit(&[ctx.root.clone()], &message) {
            Ok(()) => TaskResult::success("changes committed"),
            Err(e) => {
                ctx.failed = true;
                TaskResult::failure("commit").with_desc(e.to_string())
            }
        }
    })
}

fn load_metadata(runner: &mut Runner<ReleaseContext>, dep: TaskId) -> TaskId {
    runner.add_after(&[dep], "load release metadata", |ex| {
        let targets = ex.ctx().unit_names();
        let count = targets.len();
        let loads: Vec<TaskId> = targets
            .into_iter()
            .map(|(index, name)| ex.subtask(name, move |ex| load_one(ex.ctx(), index)))
            .collect();
        ex.subtask_after(&loads, "units loaded", move |ex| {
            if ex.dependency_failed() {
                TaskResult::failure("failed to load release metadata")
            } else {
                info!(units = count, "release metadata loaded");
                TaskResult::success(format!("release metadata loaded for {count} units"))
            }
        });
        TaskResult::success(format!("loading {count} units"))
    })
}

fn load_one(ctx: &mut ReleaseContext, index: usize) -> TaskResult {
    let settings = ctx.load_settings();
    let nested = ctx.nested_dirs(index);
    let ReleaseContext {
        units,
        vcs,
        history,
        ..
    } = &mut *ctx;
    let unit = &mut units[index];
    let id = unit.id.clone();

    if let Err(e) = load_unit(unit, &**vcs, &**history, &nested, &settings) {
        let desc = Error::unit(&id, "load release metadata", e).to_string();
        ctx.fail_unit(index);
        return TaskResult::failure("failed to load release metadata").with_desc(desc);
    }

    let state = &unit.state;
    if unit.internal {
        TaskResult::skip("internal unit").with_desc(id)
    } else if !state.needs_release {
        TaskResult::skip("no release needed").with_desc(format!("latest: {}", unit.last_tag_name()))
    } else if state.pending_release {
        TaskResult::skip(format!("pending release {}", unit.transition())).with_desc(id)
    } else {
        TaskResult::success(format!("needs release {}", unit.transition())).with_desc(id)
    }
}

fn sort_units(runner: &mut Runner<ReleaseContext>, dep: TaskId) -> TaskId {
    runner.add_critical_after(&[dep], "sort units", |ex| {
        let ctx = ex.ctx();
        match release_order(&ctx.units) {
            Ok(order) => {
                let names = order
                    .iter()
                    .map(|&i| ctx.units[i].id.as_str())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                debug!(order = %names, "release order");
                ctx.order = order;
                TaskResult::success("sorted releasable units").with_desc(names)
            }
            Err(e) => TaskResult::failure(format!("failed to sort units: {e}")),
        }
    })
}

fn common_deps(runner: &mut Runner<ReleaseContext>, dep: TaskId) -> TaskId {
    let check = runner.add_after(&[dep], "check common dependencies", |ex| {
        let ctx = ex.ctx();
        ctx.common = common_dependencies(&ctx.units);
        let drifted = ctx.common.iter().filter(|d| d.drifted()).count();
        TaskResult::success(format!("loaded common dependencies {}", ctx.common.len()))
            .with_desc(format!("{drifted} drifted"))
    });

    let update = runner.add_after(&[check], "update common dependencies", |ex| {
        let drifted: Vec<CommonDependency> = ex
            .ctx()
            .common
            .iter()
            .filter(|d| d.drifted())
            .cloned()
            .collect();
        if drifted.is_empty() {
            return TaskResult::skip("no dependencies drifted");
        }
        let count = drifted.len();
        for dep in drifted {
            ex.subtask(dep.id.clone(), move |ex| {
                let ctx = ex.ctx();
                let desc = format!("{}@{}", dep.id, dep.max);
                match converge(&mut ctx.units, std::slice::from_ref(&dep)) {
                    Ok(bumps) if bumps.is_empty() => TaskResult::skip("already aligned").with_desc(desc),
                    Ok(bumps) => {
                        let units: Vec<&str> = bumps.iter().map(|b| b.unit.as_str()).collect();
                        TaskResult::success(format!("updated {}", units.join(", "))).with_desc(desc)
                    }
                    Err(e) => {
                        ctx.failed = true;
                        TaskResult::failure("update common dependency").with_desc(e.to_string())
                    }
                }
            });
        }
        TaskResult::success(format!("{count} drifted dependencies"))
    });

    runner.add_after(&[update], "check units to release", |ex| {
        let count = ex
            .ctx()
            .units
            .iter()
            .filter(|u| u.state.needs_release)
            .count();
        match count {
            0 => TaskResult::success("no units to release"),
            1 => TaskResult::success("1 unit"),
            n => TaskResult::success(format!("{n} units")),
        }
    })
}

fn confirm_release(runner: &mut Runner<ReleaseContext>, dep: TaskId) -> TaskId {
    runner.add_critical_after(&[dep], "confirm releasable units", |ex| {
        let ctx = ex.ctx();
        if ctx.failed {
            return TaskResult::failure("release blocked by earlier failures");
        }
        let ReleaseContext {
            units,
            order,
            confirm,
            ..
        } = &mut *ctx;
        let units: &[Unit] = units;
        let releasable: Vec<&Unit> = order
            .iter()
            .map(|&i| &units[i])
            .filter(|u| u.releasable())
            .collect();
        if releasable.is_empty() {
            return TaskResult::skip("nothing to confirm");
        }
        match confirm.confirm_releasables(&releasable) {
            Ok(true) => TaskResult::success("continue with release"),
            Ok(false) => TaskResult::failure("release not confirmed"),
            Err(e) => TaskResult::failure(e.to_string()),
        }
    })
}

fn tag_units(runner: &mut Runner<ReleaseContext>, dep: TaskId) -> TaskId {
    runner.add_after(&[dep], "tag units", |ex| {
        let lineages: Vec<(usize, String)> = {
            let ctx = ex.ctx();
            ctx.order
                .iter()
                .map(|&i| (i, ctx.units[i].name().to_string()))
                .collect()
        };
        let count = lineages.len();
        let mut previous: Option<TaskId> = None;
        for (index, name) in lineages {
            previous = Some(spawn_lineage(ex, previous, index, &name));
        }
        TaskResult::success(format!("added tag tasks for {count} units"))
    })
}

fn write_changelog(runner: &mut Runner<ReleaseContext>, dep: TaskId) -> TaskId {
    runner.add_after(&[dep], "changelog", |ex| {
        let ctx = ex.ctx();
        let mut notes = ReleaseNotes::new(ctx.date);
        for &index in &ctx.order {
            let unit = &ctx.units[index];
            if !unit.state.needs_release
                || unit.changelog.is_empty()
                || ctx.failed_units.contains(&index)
            {
                continue;
            }
            let Some(tag) = &unit.state.next_tag else {
                continue;
            };
            let section = UnitNotes::new(&unit.id, tag.to_string(), tag.short(), &unit.changelog);
            if unit.is_root() {
                notes.set_root(section);
            } else {
                notes.push_unit(section);
            }
        }
        if notes.is_empty() {
            return TaskResult::skip("nothing released");
        }
        match notes.write_to(&ctx.dist()) {
            Ok(path) => {
                let desc = path.display().to_string();
                ctx.notes = Some(path);
                TaskResult::success("changelog saved").with_desc(desc)
            }
            Err(e) => {
                ctx.failed = true;
                TaskResult::failure("write changelog").with_desc(e.to_string())
            }
        }
    })
}

fn finalize(runner: &mut Runner<ReleaseContext>, dep: TaskId) -> TaskId {
    runner.add_after(&[dep], "finalizing", |ex| {
        let ctx = ex.ctx();
        if !ctx.failed {
            return TaskResult::success("release completed");
        }
        let failed: Vec<&str> = ctx
            .failed_units
            .iter()
            .map(|&i| ctx.units[i].id.as_str())
            .collect();
        let result = TaskResult::failure("release finished with failures");
        if failed.is_empty() {
            result
        } else {
            result.with_desc(failed.join(", "))
        }
    })
}
