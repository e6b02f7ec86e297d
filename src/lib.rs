#![forbid(unsafe_code)]

//! End-to-end harness for the editor plugin.
//!
//! Runs each Vim test file in a fresh headless editor, optionally next to
//! an analysis server, and reduces whatever the editor leaves behind to a
//! per-suite verdict.

pub mod aggregator;
pub mod backend;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod launcher;
pub mod models;
pub mod parser;
pub mod protocol;
pub mod scratch;

pub use config::HarnessConfig;
pub use errors::{HarnessError, Result};
