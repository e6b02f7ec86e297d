//! Child process guard.
//!
//! Supervised children are started in their own process group. The guard
//! kills the whole group, so helpers forked by the editor or the server do
//! not outlive the run, whether the guard is dropped or terminated
//! explicitly.

use std::io;
use std::process::ExitStatus;

use tokio::process::Child;
use tracing::{debug, warn};

/// Owns a child process and kills its process group on drop.
#[derive(Debug)]
pub struct ChildGuard {
    child: Option<Child>,
    /// Process group id captured at spawn time.
    pgid: Option<u32>,
    label: String,
}

impl ChildGuard {
    /// Guard `child`, which must have been spawned with `process_group(0)`.
    pub fn new(child: Child, label: impl Into<String>) -> Self {
        let pgid = child.id();
        Self {
            child: Some(child),
            pgid,
            label: label.into(),
        }
    }

    /// OS process id, while the child has not been reaped.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Wait for the child to exit.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if waiting fails or the child was already
    /// released by [`ChildGuard::terminate`].
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        match self.child.as_mut() {
            Some(child) => child.wait().await,
            None => Err(io::Error::other("child process already released")),
        }
    }

    /// Poll for exit without blocking.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if polling fails.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Err(io::Error::other("child process already released")),
        }
    }

    /// Kill the process group and the child, then reap the child.
    pub async fn terminate(&mut self) {
        self.signal_group();
        self.pgid = None;

        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.start_kill() {
                debug!(label = %self.label, %err, "child already exited");
            }
            match child.wait().await {
                Ok(status) => debug!(label = %self.label, ?status, "child reaped"),
                Err(err) => warn!(label = %self.label, %err, "failed to reap child"),
            }
        }
    }

    #[cfg(unix)]
    fn signal_group(&self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let Some(pgid) = self.pgid.and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
            Ok(()) => debug!(label = %self.label, pgid, "process group killed"),
            Err(nix::errno::Errno::ESRCH) => {}
            Err(err) => warn!(label = %self.label, pgid, %err, "failed to kill process group"),
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self) {}
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.signal_group();
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}
