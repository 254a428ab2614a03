//! Commit history classification.
//!
//! Commit messages are parsed with `git-conventional`. Breaking changes
//! (`!` or a `BREAKING CHANGE` footer) classify as breaking, `feat` as a
//! feature, `fix` and `perf` as fixes. Everything else, including messages
//! that are not conventional commits at all, is `other`.

use crate::changelog::{ChangeCategory, ChangeEntry, Changelog};
use crate::error::Result;
use crate::vcs::{SystemGit, Vcs};
use git_conventional::{Commit, Type};
use std::path::{Path, PathBuf};
use tracing::debug;

const COMMIT_START: &str = ":COMMIT_START:";
const COMMIT_END: &str = ":COMMIT_END:";
const LOG_FORMAT: &str = ":COMMIT_START:%nSHORT:%h%nLONG:%H%nAUTHOR:%an%nMESSAGE:%B:COMMIT_END:";

/// History range and path scope of one unit.
#[derive(Debug, Clone)]
pub struct HistoryQuery<'a> {
    /// Exclusive lower bound; `None` means from the beginning.
    pub from: Option<&'a str>,
    /// Inclusive upper bound, a tag or `HEAD`.
    pub to: &'a str,
    /// Directory relative to the repository root.
    pub scope: &'a Path,
    /// Nested unit directories under `scope` whose commits belong elsewhere.
    pub exclude: &'a [PathBuf],
}

/// History classification capability.
pub trait HistoryClassifier {
    /// Classify the commits selected by `query`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be read.
    fn classify(&self, query: &HistoryQuery<'_>) -> Result<Changelog>;
}

/// Map a commit message to its category, subject and body.
#[must_use]
pub fn classify_message(message: &str) -> (ChangeCategory, String, Option<String>) {
    let message = message.trim();
    let (subject, body) = match message.split_once('\n') {
        Some((subject, rest)) => {
            let rest = rest.trim();
            (subject.trim(), (!rest.is_empty()).then(|| rest.to_string()))
        }
        None => (message, None),
    };

    let category = match Commit::parse(message) {
        Ok(commit) if commit.breaking() => ChangeCategory::Breaking,
        Ok(commit) if commit.type_() == Type::FEAT => ChangeCategory::Feature,
        Ok(commit) if commit.type_() == Type::FIX || commit.type_() == Type::PERF => {
            ChangeCategory::Fix
        }
        _ => ChangeCategory::Other,
    };

    (category, subject.to_string(), body)
}

/// Parse `git log` output produced with the marker format.
#[must_use]
pub fn parse_log(output: &str) -> Changelog {
    output
        .split(COMMIT_START)
        .filter_map(|block| {
            let block = block.trim_start_matches('\n');
            let block = block.trim_end().strip_suffix(COMMIT_END).unwrap_or(block);
            let mut short = "";
            let mut long = "";
            let mut author = "";
            let mut message = None;
            let mut rest = block;
            while let Some((line, tail)) = rest.split_once('\n') {
                if let Some(v) = line.strip_prefix("SHORT:") {
                    short = v;
                } else if let Some(v) = line.strip_prefix("LONG:") {
                    long = v;
                } else if let Some(v) = line.strip_prefix("AUTHOR:") {
                    author = v;
                } else if let Some(v) = line.strip_prefix("MESSAGE:") {
                    message = Some(format!("{v}\n{tail}"));
                    break;
                }
                rest = tail;
            }
            if message.is_none() {
                message = rest.strip_prefix("MESSAGE:").map(str::to_string);
            }
            let message = message?;
            let (category, subject, body) = classify_message(&message);
            let mut entry = ChangeEntry::new(category, subject)
                .with_ids(short.trim(), long.trim())
                .with_author(author.trim());
            entry.body = body;
            Some(entry)
        })
        .collect()
}

/// [`HistoryClassifier`] reading history with `git log`.
#[derive(Debug, Clone)]
pub struct GitHistory {
    git: SystemGit,
}

impl GitHistory {
    /// Read history of the repository at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            git: SystemGit::new(root),
        }
    }
}

/// Pathspecs selecting `scope` minus the excluded directories.
#[must_use]
pub fn pathspecs(scope: &Path, exclude: &[PathBuf]) -> Vec<String> {
    let mut specs = vec![scope.display().to_string()];
    specs.extend(exclude.iter().map(|dir| format!(":!{}", dir.display())));
    specs
}

impl HistoryClassifier for GitHistory {
    fn classify(&self, query: &HistoryQuery<'_>) -> Result<Changelog> {
        let range = query
            .from
            .map_or_else(|| query.to.to_string(), |from| format!("{from}..{}", query.to));
        let specs = pathspecs(query.scope, query.exclude);
        let output = self.git.log(Some(&range), LOG_FORMAT, &specs)?;
        let changelog = parse_log(&output);
        debug!(range = %range, scope = %query.scope.display(), entries = changelog.len(), "history classified");
        Ok(changelog)
    }
}
