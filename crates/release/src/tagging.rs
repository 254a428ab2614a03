//! Per-unit tag lineage.
//!
//! Every unit gets a chain of subtasks: check need release, verify deps,
//! update manifest, write manifest, commit, tag and passed. Both manifest
//! writes are followed by the configured lockfile refresh. Lineages are
//! chained in release order so a unit's steps run only after the units it
//! depends on finished theirs. A failure anywhere in a lineage marks the
//! unit failed; the remaining steps skip and dependents skip at their
//! first step.

use crate::checks::run_check;
use crate::error::{Error, Result};
use crate::orchestrator::ReleaseContext;
use crate::resolver::internal_dependencies;
use crate::unit::Unit;
use crate::version::ReleaseTag;
use monotag_task_graph::{Executor, TaskId, TaskResult};
use std::path::PathBuf;
use tracing::info;

/// Spawn the lineage of unit `index` after `after`; returns its last step.
pub(crate) fn spawn_lineage(
    ex: &mut Executor<'_, ReleaseContext>,
    after: Option<TaskId>,
    index: usize,
    name: &str,
) -> TaskId {
    let check = ex.subtask_after(
        after.as_slice(),
        format!("{name}: check need release"),
        move |ex| check_need_release(ex.ctx(), index),
    );
    let verify = ex.subtask_after(&[check], format!("{name}: verify deps"), move |ex| {
        verify_deps(ex.ctx(), index)
    });
    let update = ex.subtask_after(&[verify], format!("{name}: update manifest"), move |ex| {
        update_manifest(ex.ctx(), index)
    });
    let write = ex.subtask_after(&[update], format!("{name}: write manifest"), move |ex| {
        write_manifest(ex.ctx(), index)
    });
    let commit = ex.subtask_after(&[write], format!("{name}: commit"), move |ex| {
        commit_unit(ex.ctx(), index)
    });
    let tag = ex.subtask_after(&[commit], format!("{name}: tag"), move |ex| {
        tag_unit(ex.ctx(), index)
    });
    ex.subtask_after(&[tag], format!("{name}: passed"), move |ex| {
        passed(ex.ctx(), index)
    })
}

fn dependency_indices(units: &[Unit], index: usize) -> Vec<usize> {
    internal_dependencies(&units[index], units)
        .iter()
        .filter_map(|id| units.iter().position(|u| &u.id == id))
        .collect()
}

/// Skip result when unit `index` has nothing left to do in this lineage.
fn blocked(ctx: &ReleaseContext, index: usize) -> Option<TaskResult> {
    let unit = &ctx.units[index];
    let id = unit.id.clone();
    if unit.internal {
        Some(TaskResult::skip("internal unit").with_desc(id))
    } else if !unit.state.needs_release {
        Some(TaskResult::skip("no release needed").with_desc(format!("latest: {}", unit.last_tag_name())))
    } else if unit.state.pending_release {
        Some(TaskResult::skip(format!("pending release {}", unit.transition())).with_desc(id))
    } else if ctx.failed_units.contains(&index) {
        Some(TaskResult::skip("previous step failed").with_desc(id))
    } else {
        None
    }
}

fn check_need_release(ctx: &mut ReleaseContext, index: usize) -> TaskResult {
    if let Some(skip) = blocked(ctx, index) {
        return skip;
    }
    let failed_deps: Vec<String> = dependency_indices(&ctx.units, index)
        .into_iter()
        .filter(|d| ctx.failed_units.contains(d))
        .map(|d| ctx.units[d].id.clone())
        .collect();
    if !failed_deps.is_empty() {
        ctx.fail_unit(index);
        return TaskResult::skip("dependency failed").with_desc(failed_deps.join(", "));
    }
    let unit = &ctx.units[index];
    TaskResult::success(unit.transition()).with_desc(unit.id.clone())
}

fn verify_deps(ctx: &mut ReleaseContext, index: usize) -> TaskResult {
    if let Some(skip) = blocked(ctx, index) {
        return skip;
    }
    let deps: Vec<(String, ReleaseTag, PathBuf)> =
        dependency_indices(&ctx.units, index)
            .into_iter()
            .map(|d| &ctx.units[d])
            .filter(|d| d.state.needs_release && !d.internal)
            .filter_map(|d| {
                d.state
                    .next_tag
                    .clone()
                    .map(|tag| (d.id.clone(), tag, d.dir.clone()))
            })
            .collect();

    for (dep_id, tag, dir) in &deps {
        if !ctx.vcs.local_tag_exists(&tag.to_string()) {
            ctx.fail_unit(index);
            return TaskResult::failure(format!("tag {tag} does not exist"))
                .with_desc(ctx.units[index].id.clone());
        }
        let unit = &mut ctx.units[index];
        let edited = unit
            .bump_dependency(dep_id, tag.version())
            .and_then(|_| unit.manifest.set_path_override(dep_id, dir));
        if let Err(e) = edited {
            let desc = Error::unit(&ctx.units[index].id, "add path override", e).to_string();
            ctx.fail_unit(index);
            return TaskResult::failure("add path override").with_desc(desc);
        }
    }

    if deps.is_empty() {
        TaskResult::success("ok")
    } else {
        let ids: Vec<&str> = deps.iter().map(|(id, _, _)| id.as_str()).collect();
        TaskResult::success("ok").with_desc(ids.join(", "))
    }
}

/// Bring `Cargo.lock` in line with the manifests on disk.
fn refresh_lockfile(ctx: &ReleaseContext) -> Result<()> {
    let lockfile = &ctx.config.lockfile;
    if lockfile.enabled {
        run_check(&lockfile.command, &ctx.root)
    } else {
        Ok(())
    }
}

fn update_manifest(ctx: &mut ReleaseContext, index: usize) -> TaskResult {
    if let Some(skip) = blocked(ctx, index) {
        return skip;
    }
    let unit = &ctx.units[index];
    let path = unit.manifest.path().display().to_string();
    let saved = unit
        .manifest
        .save()
        .map_err(|e| ("update manifest", e))
        .and_then(|()| refresh_lockfile(ctx).map_err(|e| ("tidy manifest", e)));
    match saved {
        Ok(()) => TaskResult::success("manifest updated").with_desc(path),
        Err((step, e)) => {
            let desc = Error::unit(&ctx.units[index].id, step, e).to_string();
            ctx.fail_unit(index);
            TaskResult::failure(step).with_desc(desc)
        }
    }
}

fn write_manifest(ctx: &mut ReleaseContext, index: usize) -> TaskResult {
    if let Some(skip) = blocked(ctx, index) {
        return skip;
    }
    let unit = &mut ctx.units[index];
    let cleared = unit.manifest.clear_path_overrides();
    let saved = unit
        .manifest
        .save()
        .map_err(|e| ("write manifest", e))
        .and_then(|()| refresh_lockfile(ctx).map_err(|e| ("tidy manifest", e)));
    match saved {
        Ok(()) if cleared.is_empty() => TaskResult::success("manifest written"),
        Ok(()) => TaskResult::success("manifest written")
            .with_desc(format!("dropped path overrides: {}", cleared.join(", "))),
        Err((step, e)) => {
            let desc = Error::unit(&ctx.units[index].id, step, e).to_string();
            ctx.fail_unit(index);
            TaskResult::failure(step).with_desc(desc)
        }
    }
}

fn commit_unit(ctx: &mut ReleaseContext, index: usize) -> TaskResult {
    if let Some(skip) = blocked(ctx, index) {
        return skip;
    }
    let unit = &ctx.units[index];
    let mut paths = vec![unit.dir.clone()];
    let lockfile = ctx.root.join("Cargo.lock");
    if ctx.config.lockfile.enabled && lockfile.is_file() && !lockfile.starts_with(&unit.dir) {
        paths.push(lockfile);
    }
    if !paths.iter().any(|p| ctx.vcs.is_dirty(p)) {
        return TaskResult::skip("path clean").with_desc(unit.id.clone());
    }
    let version = unit
        .state
        .next_tag
        .as_ref()
        .map(ReleaseTag::short)
        .unwrap_or_default();
    let message = format!("chore({}): prepare release {version}", unit.name());
    match ctx.vcs.commit(&paths, &message) {
        Ok(()) => TaskResult::success("changes committed"),
        Err(e) => {
            let desc = Error::unit(&unit.id, "commit", e).to_string();
            ctx.fail_unit(index);
            TaskResult::failure("commit").with_desc(desc)
        }
    }
}

fn tag_unit(ctx: &mut ReleaseContext, index: usize) -> TaskResult {
    if let Some(skip) = blocked(ctx, index) {
        return skip;
    }
    let unit = &ctx.units[index];
    let Some(tag) = unit.state.next_tag.clone() else {
        let id = unit.id.clone();
        ctx.fail_unit(index);
        return TaskResult::failure("no next tag computed").with_desc(id);
    };
    let id = unit.id.clone();
    let name = tag.to_string();

    let vcs = &ctx.vcs;
    let pushed = vcs
        .create_tag(&name, &tag.short())
        .map_err(|e| ("tag", e))
        .and_then(|()| vcs.push().map_err(|e| ("push commits", e)))
        .and_then(|()| vcs.push_tags().map_err(|e| ("push tags", e)));

    match pushed {
        Ok(()) => {
            info!(unit = %id, tag = %name, "released");
            TaskResult::success(format!("tag {name} created"))
        }
        Err((step, e)) => {
            let desc = Error::unit(&id, step, e).to_string();
            ctx.fail_unit(index);
            TaskResult::failure(step).with_desc(desc)
        }
    }
}

fn passed(ctx: &mut ReleaseContext, index: usize) -> TaskResult {
    let unit = &ctx.units[index];
    if ctx.failed_units.contains(&index) {
        TaskResult::failure("previous step did not pass").with_desc(unit.id.clone())
    } else if unit.state.needs_release {
        TaskResult::success("ok")
    } else {
        TaskResult::info("skip")
    }
}
