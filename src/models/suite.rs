//! Suite result model and synthetic-failure constructors.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use super::outcome::{TestOutcome, TestStatus};

/// Which parsing tier (or harness path) produced a [`SuiteResult`].
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    /// Parsed from a marker line carrying a JSON payload.
    Authoritative,
    /// Estimated from pass/fail tokens in the raw text.
    Heuristic,
    /// Built by the harness itself (missing file, timeout, process error).
    Synthetic,
}

/// Verdict for one test identifier.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuiteResult {
    /// Identifier of the suite; normally the requested test id.
    pub suite: String,
    /// Per-check outcomes; empty when only heuristic counts are available.
    pub tests: Vec<TestOutcome>,
    /// Passed check count.
    pub passed: usize,
    /// Failed check count.
    pub failed: usize,
    /// Skipped check count.
    pub skipped: usize,
    /// Wall-clock duration of the suite.
    #[serde(serialize_with = "super::serialize_secs")]
    pub duration: Duration,
    /// Overall verdict.
    pub success: bool,
    /// Raw captured text, kept for diagnostics.
    pub output: String,
    /// Trailing excerpt of the analysis server log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_log: Option<String>,
    /// Trailing excerpt of the editor's verbose log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_log: Option<String>,
    /// Tier that produced this result.
    pub source: ResultSource,
}

impl SuiteResult {
    /// Synthetic single-failure result.
    fn synthetic_failure(suite: &str, duration: Duration, output: String) -> Self {
        Self {
            suite: suite.to_owned(),
            tests: Vec::new(),
            passed: 0,
            failed: 1,
            skipped: 0,
            duration,
            success: false,
            output,
            server_log: None,
            editor_log: None,
            source: ResultSource::Synthetic,
        }
    }

    /// The test-definition file for `suite` does not exist.
    #[must_use]
    pub fn missing_definition(suite: &str, path: &Path) -> Self {
        Self::synthetic_failure(
            suite,
            Duration::ZERO,
            format!("Test file not found: {}", path.display()),
        )
    }

    /// The editor was killed after exceeding `timeout`.
    #[must_use]
    pub fn timed_out(suite: &str, timeout: Duration) -> Self {
        Self::synthetic_failure(
            suite,
            timeout,
            format!("Test timed out after {}", super::format_secs(timeout)),
        )
    }

    /// An unexpected failure while spawning, waiting or reading results.
    #[must_use]
    pub fn process_error(suite: &str, elapsed: Duration, error: impl ToString) -> Self {
        Self::synthetic_failure(suite, elapsed, error.to_string())
    }

    /// Counts of `(passed, failed, skipped)` over `tests`.
    #[must_use]
    pub fn count_statuses(tests: &[TestOutcome]) -> (usize, usize, usize) {
        tests
            .iter()
            .fold((0, 0, 0), |(pass, fail, skip), outcome| match outcome.status {
                TestStatus::Pass => (pass + 1, fail, skip),
                TestStatus::Fail => (pass, fail + 1, skip),
                TestStatus::Skip => (pass, fail, skip + 1),
            })
    }

    /// Total number of checks accounted for by the counters.
    #[must_use]
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    /// Attach trailing log excerpts.
    #[must_use]
    pub fn with_logs(mut self, server_log: Option<String>, editor_log: Option<String>) -> Self {
        self.server_log = server_log;
        self.editor_log = editor_log;
        self
    }
}
