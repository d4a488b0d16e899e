//! Save file name eligibility
//!
//! Decides which file names take part in a sync at all. Names rejected here
//! are never queued in either direction.
//! Exclusion rules are glob patterns matched against the bare file name.

use cloudsaves_core::domain::check_save_name;
use cloudsaves_core::ports::TIMESTAMPS_FILENAME;
use glob::Pattern;
use tracing::{debug, trace};

/// File name eligibility predicate
#[derive(Debug, Clone, Default)]
pub struct SyncFilter {
    excludes: Vec<Pattern>,
}

impl SyncFilter {
    /// Build a filter from glob patterns
    ///
    /// Invalid patterns are logged and skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let excludes: Vec<Pattern> = patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw.as_ref()) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(
                        pattern = %raw.as_ref(),
                        error = %e,
                        "Skipping invalid exclude pattern"
                    );
                    None
                }
            })
            .collect();

        debug!(excludes = excludes.len(), "SyncFilter initialized");
        Self { excludes }
    }

    /// Whether `name` may be synced
    ///
    /// Names that are not a single path component, hidden names (leading
    /// `.`), the timestamp index file and names matching an exclude pattern
    /// are rejected.
    pub fn is_eligible(&self, name: &str) -> bool {
        if let Err(e) = check_save_name(name) {
            debug!(error = %e, "Rejected file name");
            return false;
        }
        if name.starts_with('.') || name == TIMESTAMPS_FILENAME {
            return false;
        }
        if let Some(pattern) = self.excludes.iter().find(|p| p.matches(name)) {
            trace!(name, pattern = %pattern, "Excluded by pattern");
            return false;
        }
        true
    }

    /// Number of compiled exclude patterns
    pub fn excludes_count(&self) -> usize {
        self.excludes.len()
    }
}
