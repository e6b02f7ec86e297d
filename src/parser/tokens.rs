//! Heuristic tier: count literal pass and fail tokens.

use std::time::Duration;

use regex::Regex;

use super::ResultStrategy;
use crate::models::{ResultSource, SuiteResult};
use crate::{HarnessError, Result};

/// Strategy estimating counts from `[PASS]` / `[FAIL]` occurrences.
///
/// A suite that printed neither token is unsuccessful: silence from a
/// crashed editor must not read as a pass.
#[derive(Debug, Clone)]
pub struct TokenCount {
    pass: Regex,
    fail: Regex,
}

impl TokenCount {
    /// Count occurrences of the literal `pass_token` and `fail_token`.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if a token cannot be compiled.
    pub fn new(pass_token: &str, fail_token: &str) -> Result<Self> {
        let compile = |token: &str| {
            Regex::new(&regex::escape(token))
                .map_err(|err| HarnessError::Config(format!("invalid token {token:?}: {err}")))
        };
        Ok(Self {
            pass: compile(pass_token)?,
            fail: compile(fail_token)?,
        })
    }

    /// Infallible estimate used as the last tier.
    #[must_use]
    pub fn estimate(&self, suite: &str, raw: &str, observed: Duration) -> SuiteResult {
        let passed = self.pass.find_iter(raw).count();
        let failed = self.fail.find_iter(raw).count();

        SuiteResult {
            suite: suite.to_owned(),
            tests: Vec::new(),
            passed,
            failed,
            skipped: 0,
            duration: observed,
            success: failed == 0 && passed > 0,
            output: raw.to_owned(),
            server_log: None,
            editor_log: None,
            source: ResultSource::Heuristic,
        }
    }
}

impl ResultStrategy for TokenCount {
    fn name(&self) -> &'static str {
        "token_count"
    }

    fn extract(&self, suite: &str, raw: &str, observed: Duration) -> Option<SuiteResult> {
        Some(self.estimate(suite, raw, observed))
    }
}
