//! Version-control operations.
//!
//! [`Vcs`] is the capability the release engine drives. [`SystemGit`] runs
//! the `git` binary synchronously in the repository root; a hung process
//! hangs the run.

use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Version-control capability consumed by the release engine.
pub trait Vcs {
    /// Whether `path` has uncommitted changes. Errors read as clean.
    fn is_dirty(&self, path: &Path) -> bool;

    /// Checked-out branch name.
    ///
    /// # Errors
    ///
    /// Returns an error if the branch cannot be determined.
    fn current_branch(&self) -> Result<String>;

    /// Name and URL of the upstream remote.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no upstream or its URL is not configured.
    fn current_remote(&self) -> Result<(String, String)>;

    /// Local tags matching a glob, in the order git lists them.
    ///
    /// # Errors
    ///
    /// Returns an error if listing fails.
    fn list_tags(&self, pattern: &str) -> Result<Vec<String>>;

    /// Whether `tag` exists on `remote`. Errors read as absent.
    fn remote_tag_exists(&self, remote: &str, tag: &str) -> bool;

    /// Whether `tag` exists locally. Errors read as absent.
    fn local_tag_exists(&self, tag: &str) -> bool;

    /// Create an annotated tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag cannot be created.
    fn create_tag(&self, tag: &str, message: &str) -> Result<()>;

    /// Stage `paths` and commit them.
    ///
    /// # Errors
    ///
    /// Returns an error if staging or committing fails.
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<()>;

    /// Push commits to the upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the push is rejected.
    fn push(&self) -> Result<()>;

    /// Push tags to the upstream.
    ///
    /// # Errors
    ///
    /// Returns an error if the push is rejected.
    fn push_tags(&self) -> Result<()>;

    /// Raw log output for `range` limited to `pathspecs`.
    ///
    /// # Errors
    ///
    /// Returns an error if git log fails.
    fn log(&self, range: Option<&str>, format: &str, pathspecs: &[String]) -> Result<String>;
}

/// [`Vcs`] backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
    root: PathBuf,
}

impl SystemGit {
    /// Run git commands in `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Repository root this instance runs in.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args
            .into_iter()
            .map(|a| a.as_ref().to_os_string())
            .collect();
        let cmd_line = args
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(cmd = %cmd_line, "git");

        let output = Command::new("git")
            .args(&args)
            .current_dir(&self.root)
            .output()
            .map_err(|e| Error::git(format!("Failed to run git {cmd_line}: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::git(format!(
                "git {cmd_line} failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Vcs for SystemGit {
    fn is_dirty(&self, path: &Path) -> bool {
        self.run([OsStr::new("status"), OsStr::new("--porcelain"), path.as_os_str()])
            .is_ok_and(|out| !out.trim().is_empty())
    }

    fn current_branch(&self) -> Result<String> {
        Ok(self
            .run(["rev-parse", "--abbrev-ref", "HEAD"])?
            .trim()
            .to_string())
    }

    fn current_remote(&self) -> Result<(String, String)> {
        let upstream = self.run(["rev-parse", "--abbrev-ref", "@{u}"])?;
        let name = upstream
            .trim()
            .split('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let key = format!("remote.{name}.url");
        let url = self.run(["config", "--get", key.as_str()])?;
        Ok((name, url.trim().to_string()))
    }

    fn list_tags(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .run(["tag", "--list", pattern])?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn remote_tag_exists(&self, remote: &str, tag: &str) -> bool {
        let wanted = format!("refs/tags/{tag}");
        let peeled = format!("{wanted}^{{}}");
        self.run(["ls-remote", "--tags", remote, wanted.as_str()])
            .is_ok_and(|out| {
                out.lines()
                    .filter_map(|line| line.split('\t').nth(1))
                    .any(|name| name == wanted || name == peeled)
            })
    }

    fn local_tag_exists(&self, tag: &str) -> bool {
        self.run(["tag", "-l", tag])
            .is_ok_and(|out| out.lines().any(|l| l.trim() == tag))
    }

    fn create_tag(&self, tag: &str, message: &str) -> Result<()> {
        self.run(["tag", "-a", tag, "-m", message]).map(drop)
    }

    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        let mut add: Vec<OsString> = vec!["add".into(), "--".into()];
        add.extend(paths.iter().map(|p| p.as_os_str().to_os_string()));
        self.run(add)?;
        self.run(["commit", "-m", message]).map(drop)
    }

    fn push(&self) -> Result<()> {
        self.run(["push"]).map(drop)
    }

    fn push_tags(&self) -> Result<()> {
        self.run(["push", "--tags"]).map(drop)
    }

    fn log(&self, range: Option<&str>, format: &str, pathspecs: &[String]) -> Result<String> {
        let mut args = vec!["log".to_string()];
        args.extend(range.map(str::to_string));
        args.push(format!("--pretty=format:{format}"));
        args.push("--".to_string());
        args.extend(pathspecs.iter().cloned());
        self.run(args)
    }
}
