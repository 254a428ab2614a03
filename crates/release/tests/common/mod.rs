//! Recording collaborators and repository fixtures for pipeline tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use monotag_release::{
    ChangeCategory, ChangeEntry, Changelog, Collaborators, Confirm, Error, HistoryClassifier,
    HistoryQuery, ReleaseConfig, ReleaseOrchestrator, Result, Unit, Vcs, discover_units,
};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Mutable repository state behind [`FakeGit`].
#[derive(Debug)]
pub struct GitState {
    pub dirty: bool,
    /// Paths reported dirty on their own, cleared by the next commit.
    pub dirty_paths: Vec<PathBuf>,
    pub branch: String,
    pub remote: (String, String),
    pub local_tags: Vec<String>,
    pub remote_tags: BTreeSet<String>,
    /// `push_tags` fails while this tag is among the local ones.
    pub reject_tag: Option<String>,
    pub created: Vec<String>,
    pub commits: Vec<String>,
    pub committed_paths: Vec<Vec<PathBuf>>,
    pub pushes: usize,
}

impl Default for GitState {
    fn default() -> Self {
        Self {
            dirty: false,
            dirty_paths: Vec::new(),
            branch: "main".to_string(),
            remote: (
                "origin".to_string(),
                "git@example.com:acme/monorepo.git".to_string(),
            ),
            local_tags: Vec::new(),
            remote_tags: BTreeSet::new(),
            reject_tag: None,
            created: Vec::new(),
            commits: Vec::new(),
            committed_paths: Vec::new(),
            pushes: 0,
        }
    }
}

/// In-memory git that records every mutation.
#[derive(Debug, Clone, Default)]
pub struct FakeGit(pub Rc<RefCell<GitState>>);

impl FakeGit {
    /// Tags present locally and on the remote.
    pub fn with_released(tags: &[&str]) -> Self {
        let git = Self::default();
        for tag in tags {
            git.add_local(tag);
            git.publish(tag);
        }
        git
    }

    pub fn add_local(&self, tag: &str) {
        self.0.borrow_mut().local_tags.push(tag.to_string());
    }

    pub fn publish(&self, tag: &str) {
        self.0.borrow_mut().remote_tags.insert(tag.to_string());
    }

    pub fn created(&self) -> Vec<String> {
        self.0.borrow().created.clone()
    }

    /// Whether anything was committed, tagged or pushed.
    pub fn mutated(&self) -> bool {
        let state = self.0.borrow();
        !state.created.is_empty() || !state.commits.is_empty() || state.pushes > 0
    }
}

impl Vcs for FakeGit {
    fn is_dirty(&self, path: &Path) -> bool {
        let state = self.0.borrow();
        state.dirty || state.dirty_paths.iter().any(|p| p == path)
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self.0.borrow().branch.clone())
    }

    fn current_remote(&self) -> Result<(String, String)> {
        Ok(self.0.borrow().remote.clone())
    }

    fn list_tags(&self, pattern: &str) -> Result<Vec<String>> {
        let prefix = pattern.trim_end_matches('*');
        Ok(self
            .0
            .borrow()
            .local_tags
            .iter()
            .filter(|t| t.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn remote_tag_exists(&self, _remote: &str, tag: &str) -> bool {
        self.0.borrow().remote_tags.contains(tag)
    }

    fn local_tag_exists(&self, tag: &str) -> bool {
        self.0.borrow().local_tags.iter().any(|t| t == tag)
    }

    fn create_tag(&self, tag: &str, _message: &str) -> Result<()> {
        let mut state = self.0.borrow_mut();
        if state.local_tags.iter().any(|t| t == tag) {
            return Err(Error::git(format!("tag '{tag}' already exists")));
        }
        state.local_tags.push(tag.to_string());
        state.created.push(tag.to_string());
        Ok(())
    }

    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.commits.push(message.to_string());
        state.committed_paths.push(paths.to_vec());
        state.dirty = false;
        state.dirty_paths.clear();
        Ok(())
    }

    fn push(&self) -> Result<()> {
        self.0.borrow_mut().pushes += 1;
        Ok(())
    }

    fn push_tags(&self) -> Result<()> {
        let mut state = self.0.borrow_mut();
        if let Some(rejected) = state.reject_tag.clone()
            && state.local_tags.contains(&rejected)
        {
            return Err(Error::git(format!("remote rejected {rejected}")));
        }
        state.pushes += 1;
        let local = state.local_tags.clone();
        state.remote_tags.extend(local);
        Ok(())
    }

    fn log(&self, _range: Option<&str>, _format: &str, _pathspecs: &[String]) -> Result<String> {
        Ok(String::new())
    }
}

/// History keyed by unit scope; records every query as `scope from..to`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedHistory {
    changes: Rc<RefCell<HashMap<PathBuf, Vec<ChangeEntry>>>>,
    pub queries: Rc<RefCell<Vec<String>>>,
}

impl ScriptedHistory {
    pub fn with(self, scope: &str, category: ChangeCategory, subject: &str) -> Self {
        let short = format!("{:07x}", self.changes.borrow().values().flatten().count() + 0xabc);
        let entry = ChangeEntry::new(category, subject).with_ids(&short, format!("{short}ffff"));
        self.changes
            .borrow_mut()
            .entry(PathBuf::from(scope))
            .or_default()
            .push(entry);
        self
    }
}

impl HistoryClassifier for ScriptedHistory {
    fn classify(&self, query: &HistoryQuery<'_>) -> Result<Changelog> {
        self.queries.borrow_mut().push(format!(
            "{} {}..{}",
            query.scope.display(),
            query.from.unwrap_or(""),
            query.to
        ));
        Ok(self
            .changes
            .borrow()
            .get(query.scope)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .collect())
    }
}

/// Confirmation with a fixed answer that remembers what it was shown.
#[derive(Debug, Clone)]
pub struct ScriptedConfirm {
    answer: bool,
    pub shown: Rc<RefCell<Vec<String>>>,
}

impl ScriptedConfirm {
    pub fn answering(answer: bool) -> Self {
        Self {
            answer,
            shown: Rc::default(),
        }
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm_releasables(&mut self, units: &[&Unit]) -> Result<bool> {
        self.shown
            .borrow_mut()
            .extend(units.iter().map(|u| u.id.clone()));
        Ok(self.answer)
    }
}

/// A repository laid out on disk.
pub struct Repo {
    pub dir: TempDir,
}

impl Repo {
    /// A single-package repository.
    pub fn single(name: &str, deps: &[(&str, &str)]) -> Self {
        let repo = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        repo.write("Cargo.toml", &package(name, deps));
        repo
    }

    /// A virtual workspace with one package per `(dir, name, deps)`.
    pub fn workspace(members: &[(&str, &str, &[(&str, &str)])]) -> Self {
        let repo = Self {
            dir: tempfile::tempdir().unwrap(),
        };
        let dirs: Vec<String> = members.iter().map(|(dir, _, _)| format!("\"{dir}\"")).collect();
        repo.write(
            "Cargo.toml",
            &format!("[workspace]\nmembers = [{}]\n", dirs.join(", ")),
        );
        for (dir, name, deps) in members {
            repo.write(&format!("{dir}/Cargo.toml"), &package(name, deps));
        }
        repo
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel)).unwrap()
    }

    pub fn orchestrator(
        &self,
        config: ReleaseConfig,
        git: &FakeGit,
        history: &ScriptedHistory,
        confirm: &ScriptedConfirm,
    ) -> ReleaseOrchestrator {
        let units = discover_units(self.root()).unwrap();
        let collaborators = Collaborators {
            vcs: Box::new(git.clone()),
            history: Box::new(history.clone()),
            confirm: Box::new(confirm.clone()),
        };
        ReleaseOrchestrator::new(self.root(), config, units, collaborators)
    }
}

/// Manifest text of a package. A dependency whose requirement starts with
/// `path:` becomes a path dependency with version `0.1.0`.
pub fn package(name: &str, deps: &[(&str, &str)]) -> String {
    let mut out = format!("[package]\nname = \"{name}\"\nversion = \"0.1.0\"\n\n[dependencies]\n");
    for (dep, requirement) in deps {
        match requirement.strip_prefix("path:") {
            Some(path) => {
                out.push_str(&format!(
                    "{dep} = {{ path = \"{path}\", version = \"0.1.0\" }}\n"
                ));
            }
            None => out.push_str(&format!("{dep} = \"{requirement}\"\n")),
        }
    }
    out
}
