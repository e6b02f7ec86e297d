//! Editor discovery and command construction.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::{HarnessError, Result};

/// Environment variable telling the test where to write its result.
pub const OUTPUT_ENV: &str = "YAC_TEST_OUTPUT";

/// Environment variable carrying the analysis server address, when one runs.
pub const SERVER_ENV: &str = "YAC_TEST_SERVER";

/// Return the first candidate that answers `--version` successfully within
/// `timeout`.
///
/// # Errors
///
/// Returns `HarnessError::ExecutableNotFound` when no candidate answers.
pub async fn locate_editor(candidates: &[String], timeout: Duration) -> Result<String> {
    for candidate in candidates {
        let mut probe = Command::new(candidate);
        probe
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout, probe.status()).await {
            Ok(Ok(status)) if status.success() => {
                info!(editor = %candidate, "editor located");
                return Ok(candidate.clone());
            }
            Ok(Ok(status)) => debug!(candidate = %candidate, ?status, "version probe failed"),
            Ok(Err(err)) => debug!(candidate = %candidate, %err, "candidate not runnable"),
            Err(_) => debug!(candidate = %candidate, "version probe timed out"),
        }
    }

    Err(HarnessError::ExecutableNotFound(format!(
        "no editor among {candidates:?} answered --version"
    )))
}

/// One headless editor invocation for a single test file.
#[derive(Debug, Clone)]
pub struct EditorInvocation<'a> {
    /// Resolved editor executable.
    pub program: &'a str,
    /// Minimal startup file (`-u`).
    pub vimrc: &'a Path,
    /// Test-definition file sourced by the editor.
    pub test_file: &'a Path,
    /// Optional `(level, path)` for a verbose editor log.
    pub verbose_log: Option<(u8, &'a Path)>,
}

impl EditorInvocation<'_> {
    /// Arguments: no-compatible mode, the minimal startup file, no GUI
    /// startup file, silent Ex mode, no swap or backup files, then source
    /// the test and quit unconditionally.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-N".into(),
            "-u".into(),
            self.vimrc.as_os_str().to_owned(),
            "-U".into(),
            "NONE".into(),
            "-es".into(),
        ];
        if let Some((level, path)) = self.verbose_log {
            args.push(format!("-V{level}{}", path.display()).into());
        }
        for command in [
            "set noswapfile".to_owned(),
            "set nobackup".to_owned(),
            format!("source {}", escape_file_name(self.test_file)),
            "qa!".to_owned(),
        ] {
            args.push("-c".into());
            args.push(command.into());
        }
        args
    }

    /// Command running in `cwd`, in its own process group, with piped
    /// output and no stdin.
    #[must_use]
    pub fn command(&self, cwd: &Path) -> Command {
        let mut cmd = Command::new(self.program);
        cmd.args(self.args())
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// Escape characters that Ex treats specially in a file argument.
fn escape_file_name(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, ' ' | '\\' | '|' | '"' | '%' | '#') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
