//! Confirmation of the releasable set.

use crate::error::Result;
use crate::unit::Unit;

/// Gate asked once per run before anything is tagged.
pub trait Confirm {
    /// Whether the listed units may be released.
    ///
    /// # Errors
    ///
    /// Returns an error if the answer cannot be obtained.
    fn confirm_releasables(&mut self, units: &[&Unit]) -> Result<bool>;
}

/// Non-interactive policy accepting every release.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm_releasables(&mut self, _units: &[&Unit]) -> Result<bool> {
        Ok(true)
    }
}

/// One summary line per releasable unit: `id last -> next`, with a
/// marker for pending releases.
#[must_use]
pub fn summary_lines(units: &[&Unit]) -> Vec<String> {
    units
        .iter()
        .map(|unit| {
            let mut line = format!("{} {}", unit.id, unit.transition());
            if unit.state.pending_release {
                line.push_str(" (pending)");
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::tests::unit;
    use crate::version::{ReleaseTag, Version};

    #[test]
    fn test_assume_yes() {
        let u = unit("", "root", &[]);
        assert!(AssumeYes.confirm_releasables(&[&u]).unwrap());
    }

    #[test]
    fn test_summary_lines() {
        let mut api = unit("api/", "api", &[]);
        api.mark_first_release(&Version::new(0, 1, 0));
        let mut web = unit("web/", "web", &[]);
        web.mark_pending(
            ReleaseTag::parse("web/", "web/v1.1.0").unwrap(),
            Some(ReleaseTag::parse("web/", "web/v1.0.0").unwrap()),
        );
        assert_eq!(
            summary_lines(&[&api, &web]),
            vec!["api api/v0.1.0", "web web/v1.0.0 -> v1.1.0 (pending)"]
        );
    }
}
