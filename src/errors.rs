//! Error types shared across the harness.
//!
//! Only [`HarnessError::ExecutableNotFound`] and configuration errors
//! detected before the first suite are allowed to end a run early. Every
//! other variant is converted into a failed
//! [`SuiteResult`](crate::models::suite::SuiteResult) by the component that
//! observes it.

use std::fmt::{Display, Formatter};

/// Shared harness result type.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Harness error enumeration covering all failure modes.
#[derive(Debug)]
pub enum HarnessError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// No editor candidate answered the version check.
    ExecutableNotFound(String),
    /// A supervised process exceeded its hard timeout.
    Timeout(String),
    /// Spawning, waiting on, or signalling a child process failed.
    Process(String),
    /// The test-definition file for a suite does not exist.
    MissingTestDefinition(String),
    /// Wire framing or JSON body violation.
    Protocol(String),
    /// The peer closed the connection before a complete message arrived.
    ConnectionClosed(String),
    /// File-system or socket I/O failure.
    Io(String),
}

impl Display for HarnessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::ExecutableNotFound(msg) => write!(f, "executable not found: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Process(msg) => write!(f, "process: {msg}"),
            Self::MissingTestDefinition(msg) => write!(f, "missing test definition: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::ConnectionClosed(msg) => write!(f, "connection closed: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for HarnessError {}

impl HarnessError {
    /// Whether this error must abort the whole run rather than a single suite.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ExecutableNotFound(_) | Self::Config(_))
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(format!("malformed json: {err}"))
    }
}

impl From<toml::de::Error> for HarnessError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}
