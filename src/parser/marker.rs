//! Authoritative tier: a marker line carrying a JSON result payload.
//!
//! Test definitions report their verdict with one line of the form
//! `::YAC_TEST_RESULT::{"suite":"...","passed":3,...}`. Once the payload
//! parses as a JSON object it is trusted: fields are read one by one, and a
//! field of an unexpected shape falls back to its default instead of
//! discarding the whole payload.

use std::time::Duration;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::ResultStrategy;
use crate::models::{duration_from_secs, ResultSource, SuiteResult, TestOutcome, TestStatus};
use crate::{HarnessError, Result};

/// Strategy reading the first marker line in the captured text.
#[derive(Debug, Clone)]
pub struct MarkerPayload {
    pattern: Regex,
}

impl MarkerPayload {
    /// Match lines containing `marker` followed by the payload.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Config` if the pattern cannot be compiled.
    pub fn new(marker: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"(?m){}(.+)$", regex::escape(marker)))
            .map_err(|err| HarnessError::Config(format!("invalid result marker: {err}")))?;
        Ok(Self { pattern })
    }

    fn payload<'a>(&self, raw: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
    }
}

impl ResultStrategy for MarkerPayload {
    fn name(&self) -> &'static str {
        "marker_payload"
    }

    fn extract(&self, suite: &str, raw: &str, observed: Duration) -> Option<SuiteResult> {
        let text = self.payload(raw)?;

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(fields)) => Some(into_result(suite, &fields, raw, observed)),
            Ok(_) => {
                debug!(suite, "marker payload is not a json object");
                None
            }
            Err(err) => {
                debug!(suite, %err, "marker payload is malformed");
                None
            }
        }
    }
}

fn into_result(
    suite: &str,
    fields: &Map<String, Value>,
    raw: &str,
    observed: Duration,
) -> SuiteResult {
    let tests: Vec<TestOutcome> = match fields.get("tests") {
        Some(Value::Array(entries)) => entries
            .iter()
            .enumerate()
            .map(|(index, entry)| outcome(index, entry))
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(suite, kind = json_kind(other), "payload tests field is not a list, ignoring it");
            Vec::new()
        }
    };

    let explicit = (
        count(fields, "passed"),
        count(fields, "failed"),
        count(fields, "skipped"),
    );
    let reported = (
        explicit.0.unwrap_or(0),
        explicit.1.unwrap_or(0),
        explicit.2.unwrap_or(0),
    );
    let (passed, failed, skipped) = if tests.is_empty() {
        reported
    } else {
        let counted = SuiteResult::count_statuses(&tests);
        let has_explicit = explicit.0.is_some() || explicit.1.is_some() || explicit.2.is_some();
        if has_explicit && counted != reported {
            warn!(
                suite,
                ?reported,
                ?counted,
                "payload counts disagree with its test list, using the list"
            );
        }
        counted
    };

    SuiteResult {
        suite: fields
            .get("suite")
            .and_then(Value::as_str)
            .map_or_else(|| suite.to_owned(), str::to_owned),
        tests,
        passed,
        failed,
        skipped,
        duration: seconds(fields.get("duration")).unwrap_or(observed),
        success: fields
            .get("success")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        output: raw.to_owned(),
        server_log: None,
        editor_log: None,
        source: ResultSource::Authoritative,
    }
}

/// One entry of `tests`. Anything that does not read as a known verdict is
/// recorded as a failure so that it cannot turn a suite green.
fn outcome(index: usize, entry: &Value) -> TestOutcome {
    let Value::Object(fields) = entry else {
        return TestOutcome::new(
            format!("test #{}", index + 1),
            TestStatus::Fail,
            Some(format!("malformed test entry: {entry}")),
            Duration::ZERO,
        );
    };

    let name = fields
        .get("name")
        .and_then(Value::as_str)
        .map_or_else(|| format!("test #{}", index + 1), str::to_owned);
    let reason = fields
        .get("reason")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let duration = seconds(fields.get("duration")).unwrap_or(Duration::ZERO);

    let raw_status = fields.get("status");
    match raw_status.and_then(Value::as_str).and_then(TestStatus::from_wire) {
        Some(status) => TestOutcome::new(name, status, reason, duration),
        None => {
            let shown = raw_status.map_or_else(|| "missing".to_owned(), ToString::to_string);
            let reason = match reason {
                Some(reason) if !reason.trim().is_empty() => {
                    format!("unrecognised status {shown}: {reason}")
                }
                _ => format!("unrecognised status {shown}"),
            };
            TestOutcome::new(name, TestStatus::Fail, Some(reason), duration)
        }
    }
}

/// A non-negative whole count; integral floats such as `3.0` are accepted.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Range and fraction checked first.
fn count(fields: &Map<String, Value>, key: &str) -> Option<usize> {
    const LIMIT: f64 = 9_007_199_254_740_992.0; // 2^53, exact in f64.
    let value = fields.get(key)?;
    let whole = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|n| (0.0..LIMIT).contains(n) && n.fract() == 0.0)
            .map(|n| n as u64)
    });
    if whole.is_none() {
        warn!(key, %value, "payload count is not a non-negative integer, ignoring it");
    }
    whole.and_then(|n| usize::try_from(n).ok())
}

fn seconds(value: Option<&Value>) -> Option<Duration> {
    value.and_then(Value::as_f64).and_then(duration_from_secs)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
