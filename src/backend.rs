//! Analysis server sessions.
//!
//! A [`BackendSession`] owns one server process: it picks the listen
//! address, starts the server in its own process group with output going
//! to a namespaced log file, and waits until the server accepts
//! connections. Dropping the session kills the process group and removes
//! the log.

use std::fs::File;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{HarnessConfig, ServerConfig};
use crate::launcher::ChildGuard;
use crate::protocol::{self, Connection};
use crate::scratch::ScratchFile;
use crate::{HarnessError, Result};

/// Delay between readiness probes while the server starts.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound for a single readiness probe.
const READY_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// A running analysis server.
#[derive(Debug)]
pub struct BackendSession {
    server: ServerConfig,
    command: PathBuf,
    cwd: PathBuf,
    namespace: String,
    address: SocketAddr,
    log: ScratchFile,
    guard: Option<ChildGuard>,
}

impl BackendSession {
    /// Start a server as configured in `config.server`, with its log
    /// namespaced by `namespace`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if no server is configured or the
    /// address is invalid, `HarnessError::Process` if the server cannot be
    /// spawned or never accepts connections.
    pub async fn start(config: &HarnessConfig, namespace: &str) -> Result<Self> {
        let server = config
            .server
            .clone()
            .ok_or_else(|| HarnessError::Config("no [server] section configured".into()))?;
        let command = config.project_root.join(&server.command);
        let log = ScratchFile::server_log(&config.handoff_dir(), namespace)?;

        let mut session = Self {
            address: resolve_address(&server.address)?,
            server,
            command,
            cwd: config.project_root.clone(),
            namespace: namespace.to_owned(),
            log,
            guard: None,
        };
        session.spawn().await?;
        Ok(session)
    }

    /// Address the server listens on.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Namespace used for the log file name.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Path of the server log.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Last `lines` lines of the server log.
    #[must_use]
    pub fn log_tail(&self, lines: usize) -> Option<String> {
        self.log.tail(lines)
    }

    /// Open a protocol connection to the server.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Timeout` or `HarnessError::Io` if the server
    /// cannot be reached.
    pub async fn connect(&self) -> Result<Connection> {
        protocol::connect(&self.address.to_string()).await
    }

    /// Kill the server and start a fresh one. A configured port `0` picks a
    /// new ephemeral port, so [`BackendSession::address`] may change. The
    /// log keeps accumulating across resets.
    ///
    /// # Errors
    ///
    /// See [`BackendSession::start`].
    pub async fn reset(&mut self) -> Result<()> {
        info!(namespace = %self.namespace, "resetting analysis server");
        self.stop().await;
        self.address = resolve_address(&self.server.address)?;
        self.spawn().await
    }

    /// Stop the server and remove its log.
    pub async fn shutdown(mut self) {
        self.stop().await;
        info!(namespace = %self.namespace, "analysis server stopped");
    }

    async fn stop(&mut self) {
        if let Some(mut guard) = self.guard.take() {
            guard.terminate().await;
        }
    }

    async fn spawn(&mut self) -> Result<()> {
        let stdout = open_log(self.log.path())?;
        let stderr = stdout
            .try_clone()
            .map_err(|err| HarnessError::Io(format!("failed to clone server log handle: {err}")))?;

        let args = substitute_args(&self.server.args, self.address);
        let mut cmd = Command::new(&self.command);
        cmd.args(&args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(|err| {
            HarnessError::Process(format!(
                "failed to spawn analysis server {}: {err}",
                self.command.display()
            ))
        })?;
        let mut guard = ChildGuard::new(child, format!("server:{}", self.namespace));
        debug!(
            namespace = %self.namespace,
            pid = ?guard.id(),
            address = %self.address,
            "analysis server spawned"
        );

        match wait_ready(&mut guard, self.address, self.server.startup_timeout()).await {
            Ok(()) => {
                info!(namespace = %self.namespace, address = %self.address, "analysis server ready");
                self.guard = Some(guard);
                Ok(())
            }
            Err(err) => {
                guard.terminate().await;
                warn!(namespace = %self.namespace, %err, "analysis server failed to start");
                Err(err)
            }
        }
    }
}

/// Warn about missing prerequisites before a run. Returns `false` if the
/// configured server executable does not exist.
#[must_use]
pub fn check_prerequisites(config: &HarnessConfig) -> bool {
    match config.server_command() {
        Some(command) if !command.is_file() => {
            warn!(
                path = %command.display(),
                "analysis server executable not found; build it before running"
            );
            false
        }
        _ => true,
    }
}

/// Parse `address`, replacing port `0` with a currently free port.
///
/// # Errors
///
/// Returns `HarnessError::Config` for an unparsable address and
/// `HarnessError::Io` if no port can be reserved.
pub fn resolve_address(address: &str) -> Result<SocketAddr> {
    let parsed: SocketAddr = address
        .parse()
        .map_err(|err| HarnessError::Config(format!("invalid server address {address:?}: {err}")))?;
    if parsed.port() != 0 {
        return Ok(parsed);
    }
    // Released before the server binds; another process could take it first.
    let listener = TcpListener::bind(parsed)?;
    Ok(listener.local_addr()?)
}

/// Replace `{address}` and `{port}` placeholders in server arguments.
#[must_use]
pub fn substitute_args(args: &[String], address: SocketAddr) -> Vec<String> {
    let full = address.to_string();
    let port = address.port().to_string();
    args.iter()
        .map(|arg| arg.replace("{address}", &full).replace("{port}", &port))
        .collect()
}

fn open_log(path: &Path) -> Result<File> {
    File::options()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| HarnessError::Io(format!("failed to open {}: {err}", path.display())))
}

async fn wait_ready(guard: &mut ChildGuard, address: SocketAddr, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let target = address.to_string();
    loop {
        if let Some(status) = guard.try_wait()? {
            return Err(HarnessError::Process(format!(
                "analysis server exited with {status} before accepting connections"
            )));
        }
        if protocol::connect_timeout(&target, READY_PROBE_TIMEOUT)
            .await
            .is_ok()
        {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::Process(format!(
                "analysis server did not accept connections on {address} within {}s",
                timeout.as_secs()
            )));
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}
