//! Headless editor launcher.
//!
//! Runs one test-definition file in a fresh editor process and turns
//! whatever it leaves behind into a [`SuiteResult`]. The launcher never
//! returns an error for a single suite: timeouts, missing files and
//! process failures all become synthetic failed results so a batch can
//! keep going.
//!
//! - `editor`: locating the executable and building its arguments.
//! - `guard`: [`ChildGuard`], process-group cleanup on every exit path.

pub mod editor;
pub mod guard;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::backend::BackendSession;
use crate::config::HarnessConfig;
use crate::models::{format_secs, SuiteResult};
use crate::parser::OutputParser;
use crate::scratch::ScratchFile;
use crate::{HarnessError, Result};

pub use editor::{locate_editor, EditorInvocation, OUTPUT_ENV, SERVER_ENV};
pub use guard::ChildGuard;

/// How long to keep draining output pipes after the editor is gone.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Runs test suites in a located editor.
#[derive(Debug)]
pub struct Launcher {
    config: Arc<HarnessConfig>,
    editor: String,
    parser: OutputParser,
}

impl Launcher {
    /// Probe the configured candidates and build a launcher around the first
    /// editor that answers.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::ExecutableNotFound` if no editor is usable, or
    /// `HarnessError::Config` if the parser tokens are invalid.
    pub async fn locate(config: Arc<HarnessConfig>) -> Result<Self> {
        let timeout = Duration::from_secs(config.editor.version_timeout_seconds);
        let editor = locate_editor(&config.editor.candidates, timeout).await?;
        Self::with_editor(config, editor)
    }

    /// Build a launcher around a known editor executable without probing.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if the parser tokens are invalid.
    pub fn with_editor(config: Arc<HarnessConfig>, editor: impl Into<String>) -> Result<Self> {
        let parser = OutputParser::from_config(&config.parser)?;
        Ok(Self {
            config,
            editor: editor.into(),
            parser,
        })
    }

    /// Resolved editor executable.
    #[must_use]
    pub fn editor(&self) -> &str {
        &self.editor
    }

    /// Path of the test-definition file for `test_id`.
    #[must_use]
    pub fn test_file(&self, test_id: &str) -> PathBuf {
        let ext = Path::new(&self.config.test_pattern)
            .extension()
            .map_or_else(|| "vim".to_owned(), |ext| ext.to_string_lossy().into_owned());
        self.config.test_dir().join(format!("{test_id}.{ext}"))
    }

    /// Whether the test-definition file for `test_id` exists.
    #[must_use]
    pub fn has_definition(&self, test_id: &str) -> bool {
        self.definition(test_id).is_ok()
    }

    /// Existing test-definition file for `test_id`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::MissingTestDefinition` if the file is absent.
    pub fn definition(&self, test_id: &str) -> Result<PathBuf> {
        let path = self.test_file(test_id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(HarnessError::MissingTestDefinition(
                path.display().to_string(),
            ))
        }
    }

    /// Run one suite with a hard `timeout`, optionally against `backend`.
    pub async fn run(
        &self,
        test_id: &str,
        timeout: Duration,
        backend: Option<&BackendSession>,
    ) -> SuiteResult {
        let span = info_span!("suite", suite = %test_id);
        self.run_inner(test_id, timeout, backend)
            .instrument(span)
            .await
    }

    async fn run_inner(
        &self,
        test_id: &str,
        timeout: Duration,
        backend: Option<&BackendSession>,
    ) -> SuiteResult {
        let test_file = match self.definition(test_id) {
            Ok(path) => path,
            Err(err) => {
                warn!(%err, "skipping suite");
                return SuiteResult::missing_definition(test_id, &self.test_file(test_id));
            }
        };

        let started = Instant::now();
        let dir = self.config.handoff_dir();
        let handoff = match ScratchFile::handoff(&dir, test_id) {
            Ok(file) => file,
            Err(err) => return SuiteResult::process_error(test_id, started.elapsed(), err),
        };
        let editor_log = if self.config.editor.verbose_log {
            match ScratchFile::editor_log(&dir, test_id) {
                Ok(file) => Some(file),
                Err(err) => return SuiteResult::process_error(test_id, started.elapsed(), err),
            }
        } else {
            None
        };

        info!(timeout_secs = timeout.as_secs_f64(), "starting suite");
        let result = match self
            .execute(test_id, &test_file, timeout, backend, &handoff, editor_log.as_ref())
            .await
        {
            Ok(output) => self.parser.parse(test_id, &output, started.elapsed()),
            Err(HarnessError::Timeout(reason)) => {
                warn!(%reason, "suite timed out");
                SuiteResult::timed_out(test_id, timeout)
            }
            Err(err) => {
                warn!(%err, "suite failed to run");
                SuiteResult::process_error(test_id, started.elapsed(), err)
            }
        };

        let lines = self.config.log_tail_lines;
        let server_log = backend.and_then(|session| session.log_tail(lines));
        let editor_log = editor_log.as_ref().and_then(|file| file.tail(lines));

        info!(
            passed = result.passed,
            failed = result.failed,
            skipped = result.skipped,
            success = result.success,
            source = ?result.source,
            "suite finished"
        );
        result.with_logs(server_log, editor_log)
    }

    /// Spawn the editor and return the text to parse: the handoff file if
    /// the test wrote one, otherwise captured stdout and stderr.
    async fn execute(
        &self,
        test_id: &str,
        test_file: &Path,
        timeout: Duration,
        backend: Option<&BackendSession>,
        handoff: &ScratchFile,
        editor_log: Option<&ScratchFile>,
    ) -> Result<String> {
        let vimrc = self.config.vimrc();
        let invocation = EditorInvocation {
            program: &self.editor,
            vimrc: &vimrc,
            test_file,
            verbose_log: editor_log.map(|file| (self.config.editor.verbose_level, file.path())),
        };
        let mut cmd = invocation.command(&self.config.project_root);
        cmd.env(OUTPUT_ENV, handoff.path());
        if let Some(session) = backend {
            cmd.env(SERVER_ENV, session.address().to_string());
        }

        let mut child = cmd.spawn().map_err(|err| {
            HarnessError::Process(format!("failed to spawn {}: {err}", self.editor))
        })?;
        let stdout = spawn_drain(child.stdout.take());
        let stderr = spawn_drain(child.stderr.take());
        let mut guard = ChildGuard::new(child, test_id);
        debug!(pid = ?guard.id(), "editor spawned");

        let waited = tokio::time::timeout(timeout, guard.wait()).await;
        match waited {
            Ok(Ok(status)) => debug!(?status, "editor exited"),
            Ok(Err(err)) => {
                guard.terminate().await;
                stdout.abort();
                stderr.abort();
                return Err(HarnessError::Process(format!(
                    "failed to wait for editor: {err}"
                )));
            }
            Err(_) => {
                guard.terminate().await;
                stdout.abort();
                stderr.abort();
                return Err(HarnessError::Timeout(format!(
                    "{test_id} exceeded {}",
                    format_secs(timeout)
                )));
            }
        }

        // Stragglers in the group would keep the pipes open.
        guard.terminate().await;
        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;

        if let Some(text) = handoff.read()? {
            debug!(bytes = text.len(), "using handoff file");
            return Ok(text);
        }
        debug!("no handoff file, parsing captured output");
        Ok(format!("{stdout}{stderr}"))
    }
}

fn spawn_drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(err) = pipe.read_to_end(&mut buf).await {
                debug!(%err, "output pipe read failed");
            }
        }
        buf
    })
}

async fn collect(mut handle: JoinHandle<Vec<u8>>) -> String {
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(err)) => {
            debug!(%err, "output reader task failed");
            String::new()
        }
        Err(_) => {
            handle.abort();
            warn!("output pipe still open after editor exit");
            String::new()
        }
    }
}
