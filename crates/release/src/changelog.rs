//! Classified change history and the aggregated release notes document.

use crate::error::Result;
use crate::version::BumpType;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the rendered release notes inside the dist directory.
pub const CHANGELOG_FILE: &str = "CHANGELOG.md";

/// Category of a change, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    /// Anything that does not affect the version.
    Other,
    /// Bug fix or performance improvement.
    Fix,
    /// New functionality.
    Feature,
    /// Incompatible change.
    Breaking,
}

impl ChangeCategory {
    /// The version increment this category asks for.
    #[must_use]
    pub const fn bump_type(self) -> BumpType {
        match self {
            Self::Breaking => BumpType::Major,
            Self::Feature => BumpType::Minor,
            Self::Fix => BumpType::Patch,
            Self::Other => BumpType::None,
        }
    }
}

/// One classified history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    /// Abbreviated commit id.
    pub short_id: String,
    /// Full commit id.
    pub long_id: String,
    /// Commit author.
    pub author: String,
    /// First line of the message.
    pub subject: String,
    /// Remaining message lines, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Classification.
    pub category: ChangeCategory,
}

impl ChangeEntry {
    /// Create an entry without commit metadata.
    #[must_use]
    pub fn new(category: ChangeCategory, subject: impl Into<String>) -> Self {
        Self {
            short_id: String::new(),
            long_id: String::new(),
            author: String::new(),
            subject: subject.into(),
            body: None,
            category,
        }
    }

    /// Attach commit ids.
    #[must_use]
    pub fn with_ids(mut self, short_id: impl Into<String>, long_id: impl Into<String>) -> Self {
        self.short_id = short_id.into();
        self.long_id = long_id.into();
        self
    }

    /// Attach the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Render as a changelog list item.
    #[must_use]
    pub fn line(&self) -> String {
        if self.short_id.is_empty() {
            format!("* {}", self.subject)
        } else {
            format!("* {} {}", self.short_id, self.subject)
        }
    }
}

/// Entries collected for one unit since its last release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Changelog {
    entries: Vec<ChangeEntry>,
}

impl Changelog {
    /// Create an empty changelog.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry.
    pub fn push(&mut self, entry: ChangeEntry) {
        self.entries.push(entry);
    }

    /// Whether no entries were collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// All entries in history order.
    #[must_use]
    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    /// Breaking entries.
    pub fn breaking(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.category == ChangeCategory::Breaking)
    }

    /// Every entry that is not breaking.
    pub fn others(&self) -> impl Iterator<Item = &ChangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.category != ChangeCategory::Breaking)
    }

    /// The strictest bump any entry asks for.
    #[must_use]
    pub fn bump_type(&self) -> BumpType {
        self.entries
            .iter()
            .map(|e| e.category.bump_type())
            .max()
            .unwrap_or(BumpType::None)
    }
}

impl FromIterator<ChangeEntry> for Changelog {
    fn from_iter<I: IntoIterator<Item = ChangeEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Release notes of a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitNotes {
    /// Unit identity.
    pub unit: String,
    /// Full next tag, e.g. `api/v1.3.0`.
    pub tag: String,
    /// Version part of the tag, e.g. `v1.3.0`.
    pub version: String,
    /// Rendered breaking change lines.
    pub breaking: Vec<String>,
    /// Rendered lines of every other change.
    pub changes: Vec<String>,
}

impl UnitNotes {
    /// Build notes from a unit's changelog.
    #[must_use]
    pub fn new(
        unit: impl Into<String>,
        tag: impl Into<String>,
        version: impl Into<String>,
        changelog: &Changelog,
    ) -> Self {
        Self {
            unit: unit.into(),
            tag: tag.into(),
            version: version.into(),
            breaking: changelog.breaking().map(ChangeEntry::line).collect(),
            changes: changelog.others().map(ChangeEntry::line).collect(),
        }
    }
}

/// Release notes aggregated over every released unit.
///
/// The repository root unit renders first. Lines that also appear in a
/// sub-unit section are left out of the root section so each change is
/// listed once, under the unit that owns it.
#[derive(Debug, Clone)]
pub struct ReleaseNotes {
    date: DateTime<Utc>,
    root: Option<UnitNotes>,
    units: Vec<UnitNotes>,
}

impl ReleaseNotes {
    /// Create empty notes dated `date`.
    #[must_use]
    pub const fn new(date: DateTime<Utc>) -> Self {
        Self {
            date,
            root: None,
            units: Vec::new(),
        }
    }

    /// Set the root unit's notes.
    pub fn set_root(&mut self, notes: UnitNotes) {
        self.root = Some(notes);
    }

    /// Append a sub-unit's notes.
    pub fn push_unit(&mut self, notes: UnitNotes) {
        self.units.push(notes);
    }

    /// Whether nothing was released.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.units.is_empty()
    }

    fn listed_in_units(&self, line: &str, breaking: bool) -> bool {
        self.units.iter().any(|unit| {
            let lines = if breaking { &unit.breaking } else { &unit.changes };
            lines.iter().any(|l| l == line)
        })
    }

    /// Render the document as Markdown.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Changelog\n");
        let _ = writeln!(out, "_Released {}_", self.date.format("%Y-%m-%d"));

        if let Some(root) = &self.root {
            let breaking: Vec<&String> = root
                .breaking
                .iter()
                .filter(|line| !self.listed_in_units(line, true))
                .collect();
            let changes: Vec<&String> = root
                .changes
                .iter()
                .filter(|line| !self.listed_in_units(line, false))
                .collect();
            write_section(&mut out, root, &breaking, &changes);
        }

        for unit in &self.units {
            let breaking: Vec<&String> = unit.breaking.iter().collect();
            let changes: Vec<&String> = unit.changes.iter().collect();
            write_section(&mut out, unit, &breaking, &changes);
        }

        out
    }

    /// Write the document to `dist/CHANGELOG.md`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_to(&self, dist: &Path) -> Result<PathBuf> {
        let path = dist.join(CHANGELOG_FILE);
        fs::write(&path, self.to_markdown())?;
        info!(path = %path.display(), "release notes written");
        Ok(path)
    }
}

fn write_section(out: &mut String, notes: &UnitNotes, breaking: &[&String], changes: &[&String]) {
    let _ = writeln!(out, "\n## {}\n", notes.tag);
    let _ = writeln!(out, "`{}@{}`", notes.unit, notes.version);
    for (title, lines) in [("Breaking Changes", breaking), ("Changes", changes)] {
        if lines.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n### {title}\n");
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(category: ChangeCategory, short: &str, subject: &str) -> ChangeEntry {
        ChangeEntry::new(category, subject).with_ids(short, format!("{short}0000"))
    }

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_bump_precedence() {
        let mut log = Changelog::new();
        assert_eq!(log.bump_type(), BumpType::None);

        log.push(entry(ChangeCategory::Other, "a1", "chore: deps"));
        assert_eq!(log.bump_type(), BumpType::None);

        log.push(entry(ChangeCategory::Fix, "a2", "fix: x"));
        log.push(entry(ChangeCategory::Fix, "a3", "fix: y"));
        assert_eq!(log.bump_type(), BumpType::Patch);

        log.push(entry(ChangeCategory::Feature, "a4", "feat: z"));
        assert_eq!(log.bump_type(), BumpType::Minor);

        log.push(entry(ChangeCategory::Breaking, "a5", "feat!: drop v1 api"));
        assert_eq!(log.bump_type(), BumpType::Major);
    }

    #[test]
    fn test_partition_breaking_and_others() {
        let log: Changelog = [
            entry(ChangeCategory::Breaking, "b1", "remove api"),
            entry(ChangeCategory::Fix, "f1", "fix crash"),
            entry(ChangeCategory::Other, "o1", "docs"),
        ]
        .into_iter()
        .collect();

        assert_eq!(log.breaking().count(), 1);
        assert_eq!(log.others().count(), 2);
        assert_eq!(log.entries()[0].line(), "* b1 remove api");
        assert_eq!(ChangeEntry::new(ChangeCategory::Feature, "initial release").line(), "* initial release");
    }

    #[test]
    fn test_markdown_root_then_units() {
        let root_log: Changelog = [
            entry(ChangeCategory::Feature, "r1", "root feature"),
            entry(ChangeCategory::Fix, "s1", "shared fix"),
        ]
        .into_iter()
        .collect();
        let api_log: Changelog = [
            entry(ChangeCategory::Breaking, "b1", "new wire format"),
            entry(ChangeCategory::Fix, "s1", "shared fix"),
        ]
        .into_iter()
        .collect();

        let mut notes = ReleaseNotes::new(date());
        notes.set_root(UnitNotes::new("monorepo", "v1.1.0", "v1.1.0", &root_log));
        notes.push_unit(UnitNotes::new("api", "api/v3.0.0", "v3.0.0", &api_log));

        let md = notes.to_markdown();
        let expected = "# Changelog\n\n_Released 2026-03-01_\n\n## v1.1.0\n\n`monorepo@v1.1.0`\n\n### Changes\n\n* r1 root feature\n\n## api/v3.0.0\n\n`api@v3.0.0`\n\n### Breaking Changes\n\n* b1 new wire format\n\n### Changes\n\n* s1 shared fix\n";
        assert_eq!(md, expected);
    }

    #[test]
    fn test_write_to_dist() {
        let dir = tempfile::tempdir().unwrap();
        let mut notes = ReleaseNotes::new(date());
        assert!(notes.is_empty());
        let log: Changelog = [entry(ChangeCategory::Fix, "f1", "fix")].into_iter().collect();
        notes.push_unit(UnitNotes::new("web", "web/v0.1.1", "v0.1.1", &log));

        let path = notes.write_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(CHANGELOG_FILE));
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.contains("## web/v0.1.1"));
        assert!(written.contains("* f1 fix"));
    }
}
