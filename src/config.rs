//! Harness configuration parsing and validation.
//!
//! Configuration lives in an optional `harness.toml` at the project root.
//! Every field has a default, so an absent file (or an empty one) yields a
//! working setup for the conventional `tests/vim/test_*.vim` layout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::{HarnessError, Result};

/// File name looked up in the project root when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "harness.toml";

/// Arrangement of analysis-server processes across suites.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// One server for the whole run; suites observe each other's residue.
    #[default]
    Shared,
    /// A fresh server per suite, namespaced by test id.
    Isolated,
}

/// Editor discovery and invocation settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct EditorConfig {
    /// Executables probed in order with `--version`.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    /// Minimal startup file passed with `-u`, relative to the project root.
    #[serde(default = "default_vimrc")]
    pub vimrc: PathBuf,
    /// Upper bound for each `--version` probe.
    #[serde(default = "default_version_timeout")]
    pub version_timeout_seconds: u64,
    /// Capture a verbose editor log (`-V<level><file>`) for diagnostics.
    #[serde(default)]
    pub verbose_log: bool,
    /// Verbosity level used when `verbose_log` is set.
    #[serde(default = "default_verbose_level")]
    pub verbose_level: u8,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            vimrc: default_vimrc(),
            version_timeout_seconds: default_version_timeout(),
            verbose_log: false,
            verbose_level: default_verbose_level(),
        }
    }
}

/// Analysis server (LSP bridge) launch settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Server executable, relative to the project root unless absolute.
    #[serde(default = "default_server_command")]
    pub command: PathBuf,
    /// Arguments; `{address}` and `{port}` are substituted per session.
    #[serde(default)]
    pub args: Vec<String>,
    /// Listen address; port `0` picks a free ephemeral port per session.
    #[serde(default = "default_server_address")]
    pub address: String,
    /// How long to wait for the server to accept connections.
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_seconds: u64,
}

impl ServerConfig {
    /// Maximum time to wait for the server to accept a connection.
    #[must_use]
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_seconds)
    }
}

/// Tokens the output parser looks for in captured text.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ParserConfig {
    /// Prefix of the line carrying the authoritative JSON payload.
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Literal counted as one passing check by the heuristic fallback.
    #[serde(default = "default_pass_token")]
    pub pass_token: String,
    /// Literal counted as one failing check by the heuristic fallback.
    #[serde(default = "default_fail_token")]
    pub fail_token: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            pass_token: default_pass_token(),
            fail_token: default_fail_token(),
        }
    }
}

fn default_marker() -> String {
    "::YAC_TEST_RESULT::".into()
}

fn default_pass_token() -> String {
    "[PASS]".into()
}

fn default_fail_token() -> String {
    "[FAIL]".into()
}

fn default_candidates() -> Vec<String> {
    vec![
        "vim".to_owned(),
        "/usr/bin/vim".to_owned(),
        "/usr/local/bin/vim".to_owned(),
    ]
}

fn default_vimrc() -> PathBuf {
    PathBuf::from("vimrc")
}

fn default_version_timeout() -> u64 {
    5
}

fn default_verbose_level() -> u8 {
    9
}

fn default_server_command() -> PathBuf {
    PathBuf::from("zig-out/bin/lsp-bridge")
}

fn default_server_address() -> String {
    "127.0.0.1:0".into()
}

fn default_startup_timeout() -> u64 {
    10
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_test_dir() -> PathBuf {
    PathBuf::from("tests/vim")
}

fn default_test_pattern() -> String {
    "test_*.vim".into()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_log_tail_lines() -> usize {
    50
}

/// Top-level harness configuration parsed from `harness.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HarnessConfig {
    /// Project root; the editor runs with this as its working directory.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Directory holding test-definition files, relative to the root.
    #[serde(default = "default_test_dir")]
    pub test_dir: PathBuf,
    /// Glob (file name only) selecting test-definition files.
    #[serde(default = "default_test_pattern")]
    pub test_pattern: String,
    /// Default per-suite hard timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Analysis server topology; ignored without a `[server]` section.
    #[serde(default)]
    pub topology: Topology,
    /// Lines kept from the end of server and editor logs.
    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,
    /// Directory for handoff and log files; defaults to the system temp dir.
    #[serde(default)]
    pub handoff_dir: Option<PathBuf>,
    /// Editor settings.
    #[serde(default)]
    pub editor: EditorConfig,
    /// Output parser tokens.
    #[serde(default)]
    pub parser: ParserConfig,
    /// Analysis server settings; absent means suites run without a server.
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

impl HarnessConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// A relative `project_root` is resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| HarnessError::Config(format!("failed to read config: {err}")))?;
        let base = path.parent().filter(|p| !p.as_os_str().is_empty());
        Self::parse(&raw, base)
    }

    /// Parse configuration from a TOML string.
    ///
    /// A relative `project_root` is resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Self::parse(raw, None)
    }

    /// Load `harness.toml` from `root` if present, otherwise use defaults
    /// rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if an existing file is invalid or the
    /// root does not exist.
    pub fn discover(root: &Path) -> Result<Self> {
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "loading harness config");
            return Self::load_from_path(candidate);
        }
        debug!(root = %root.display(), "no harness config found, using defaults");
        Self::with_project_root(root)
    }

    /// Default configuration rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if `root` does not exist.
    pub fn with_project_root(root: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str("")?;
        config.project_root = root.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    fn parse(raw: &str, base: Option<&Path>) -> Result<Self> {
        let mut config: Self = toml::from_str(raw)?;
        if let Some(base) = base {
            if config.project_root.is_relative() {
                config.project_root = base.join(&config.project_root);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Absolute directory holding test-definition files.
    #[must_use]
    pub fn test_dir(&self) -> PathBuf {
        self.project_root.join(&self.test_dir)
    }

    /// Absolute path of the minimal editor startup file.
    #[must_use]
    pub fn vimrc(&self) -> PathBuf {
        self.project_root.join(&self.editor.vimrc)
    }

    /// Directory for handoff files and logs.
    #[must_use]
    pub fn handoff_dir(&self) -> PathBuf {
        self.handoff_dir
            .as_ref()
            .map_or_else(std::env::temp_dir, |dir| self.project_root.join(dir))
    }

    /// Default per-suite hard timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Absolute path of the configured server executable, if any.
    #[must_use]
    pub fn server_command(&self) -> Option<PathBuf> {
        self.server
            .as_ref()
            .map(|server| self.project_root.join(&server.command))
    }

    fn validate(&mut self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(HarnessError::Config(
                "timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.editor.candidates.is_empty() {
            return Err(HarnessError::Config(
                "editor.candidates must not be empty".into(),
            ));
        }

        if self.test_pattern.is_empty() || self.test_pattern.contains(['/', '\\']) {
            return Err(HarnessError::Config(
                "test_pattern must be a non-empty file name glob".into(),
            ));
        }

        let parser = &self.parser;
        if parser.marker.is_empty() || parser.pass_token.is_empty() || parser.fail_token.is_empty()
        {
            return Err(HarnessError::Config(
                "parser marker and tokens must not be empty".into(),
            ));
        }

        if let Some(server) = &self.server {
            if server.command.as_os_str().is_empty() {
                return Err(HarnessError::Config(
                    "server.command must not be empty".into(),
                ));
            }
            if server.startup_timeout_seconds == 0 {
                return Err(HarnessError::Config(
                    "server.startup_timeout_seconds must be greater than zero".into(),
                ));
            }
        }

        let canonical_root = self
            .project_root
            .canonicalize()
            .map_err(|err| HarnessError::Config(format!("project_root invalid: {err}")))?;
        self.project_root = canonical_root;

        Ok(())
    }
}
