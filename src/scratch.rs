//! Per-run scratch files: the result handoff file and captured logs.
//!
//! Every path is namespaced by test id (or session namespace) and the
//! harness process id, so concurrent harness processes never share a file.
//! The path is held as a [`TempPath`], which deletes it when the
//! [`ScratchFile`] is dropped, on every exit path.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::debug;

use crate::{HarnessError, Result};

/// A uniquely named temporary path removed on drop. The file itself is
/// created by whoever writes it (the editor, the server), not here.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
}

impl ScratchFile {
    /// Handoff path through which the editor reports its structured result.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if a stale file at the path cannot be
    /// removed.
    pub fn handoff(dir: &Path, test_id: &str) -> Result<Self> {
        Self::claim(Self::path_for(dir, "yac_test", test_id, "txt"))
    }

    /// Verbose editor log for one suite.
    ///
    /// # Errors
    ///
    /// See [`ScratchFile::handoff`].
    pub fn editor_log(dir: &Path, test_id: &str) -> Result<Self> {
        Self::claim(Self::path_for(dir, "yac_editor", test_id, "log"))
    }

    /// Analysis server log for one backend session.
    ///
    /// # Errors
    ///
    /// See [`ScratchFile::handoff`].
    pub fn server_log(dir: &Path, namespace: &str) -> Result<Self> {
        Self::claim(Self::path_for(dir, "yac_server", namespace, "log"))
    }

    /// `<dir>/<prefix>_<name>_<pid>.<ext>` with `name` reduced to
    /// file-name-safe characters.
    #[must_use]
    pub fn path_for(dir: &Path, prefix: &str, name: &str, ext: &str) -> PathBuf {
        let safe: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        dir.join(format!("{prefix}_{safe}_{}.{ext}", std::process::id()))
    }

    /// Take ownership of `path`, discarding any leftover from a crashed run
    /// so it cannot be mistaken for a fresh result.
    fn claim(path: PathBuf) -> Result<Self> {
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "removed stale scratch file"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(HarnessError::Io(format!(
                    "cannot clear stale file {}: {err}",
                    path.display()
                )))
            }
        }
        Ok(Self {
            path: TempPath::from_path(path),
        })
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contents of the file, or `None` if nothing was written.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Io` if the file exists but cannot be read.
    pub fn read(&self) -> Result<Option<String>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(HarnessError::Io(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    /// Last `lines` lines of the file; `None` if absent, empty, or
    /// `lines == 0`.
    #[must_use]
    pub fn tail(&self, lines: usize) -> Option<String> {
        tail_lines(&self.path, lines)
    }
}

/// Last `lines` lines of the file at `path`.
#[must_use]
pub fn tail_lines(path: &Path, lines: usize) -> Option<String> {
    if lines == 0 {
        return None;
    }
    let bytes = fs::read(path).ok()?;
    let text = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = text.lines().collect();
    if all.is_empty() {
        return None;
    }
    let start = all.len().saturating_sub(lines);
    Some(all[start..].join("\n"))
}
