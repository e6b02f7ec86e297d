//! Individual check outcomes reported by a structured result payload.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Reason recorded for a non-passing outcome whose payload gave none.
pub const MISSING_REASON: &str = "no reason reported";

/// Verdict of one named check inside a suite.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The check passed.
    Pass,
    /// The check failed; `error` from older test scripts maps here.
    #[serde(alias = "error")]
    Fail,
    /// The check was skipped.
    Skip,
}

impl TestStatus {
    /// Parse a status word as written by a test script, ignoring case.
    /// `error` counts as a failure.
    #[must_use]
    pub fn from_wire(word: &str) -> Option<Self> {
        match word.trim().to_ascii_lowercase().as_str() {
            "pass" => Some(Self::Pass),
            "fail" | "error" => Some(Self::Fail),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// One named check inside a suite.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TestOutcome {
    /// Check name as written by the test definition.
    pub name: String,
    /// Verdict.
    pub status: TestStatus,
    /// Failure or skip reason; always present unless the check passed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Time spent in the check.
    #[serde(serialize_with = "super::serialize_secs")]
    pub duration: Duration,
}

impl TestOutcome {
    /// Build an outcome, filling in a placeholder reason for non-passing
    /// checks that did not report one.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        status: TestStatus,
        reason: Option<String>,
        duration: Duration,
    ) -> Self {
        let reason = match (status, reason) {
            (TestStatus::Pass, reason) => reason,
            (_, Some(reason)) if !reason.trim().is_empty() => Some(reason),
            (_, _) => Some(MISSING_REASON.to_owned()),
        };
        Self {
            name: name.into(),
            status,
            reason,
            duration,
        }
    }
}
