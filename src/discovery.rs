//! Test discovery: enumerate test identifiers from the filesystem.
//!
//! Discovery returns plain data and never runs anything, so it can be
//! exercised without an editor.

use std::path::Path;

use tracing::debug;

use crate::{HarnessError, Result};

/// List test identifiers (file stems) under `test_dir` matching `pattern`,
/// sorted lexicographically and deduplicated.
///
/// A missing directory yields an empty list.
///
/// # Errors
///
/// Returns `HarnessError::Config` if `pattern` is not a valid glob.
pub fn discover(test_dir: &Path, pattern: &str) -> Result<Vec<String>> {
    let full = test_dir.join(pattern).to_string_lossy().to_string();
    let entries = glob::glob(&full)
        .map_err(|err| HarnessError::Config(format!("invalid test pattern {pattern:?}: {err}")))?;

    let mut ids: Vec<String> = entries
        .flatten()
        .filter(|path| path.is_file())
        .filter_map(|path| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
        .collect();
    ids.sort();
    ids.dedup();

    debug!(dir = %test_dir.display(), count = ids.len(), "discovered tests");
    Ok(ids)
}

/// Selection applied to the discovered identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TestFilter {
    /// Every discovered test.
    #[default]
    All,
    /// Exactly these identifiers, in the given order, whether or not they
    /// were discovered. Unknown names become synthetic failures.
    Names(Vec<String>),
    /// Discovered identifiers containing the substring.
    Substring(String),
}

impl TestFilter {
    /// Build a filter from CLI-style inputs: explicit names win over a
    /// substring, and neither means every test.
    #[must_use]
    pub fn from_args(names: Vec<String>, substring: Option<String>) -> Self {
        if !names.is_empty() {
            Self::Names(names)
        } else if let Some(pattern) = substring {
            Self::Substring(pattern)
        } else {
            Self::All
        }
    }

    /// Apply the filter to `discovered`.
    #[must_use]
    pub fn select(&self, discovered: Vec<String>) -> Vec<String> {
        match self {
            Self::All => discovered,
            Self::Names(names) => names.clone(),
            Self::Substring(pattern) => discovered
                .into_iter()
                .filter(|id| id.contains(pattern.as_str()))
                .collect(),
        }
    }
}
