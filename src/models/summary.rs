//! Run-level aggregate over all suite results.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use super::suite::SuiteResult;

/// Totals for one harness run; computed on demand, never stored.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunSummary {
    /// When the summary was computed, shown as the `Finished:` line.
    pub generated_at: DateTime<Utc>,
    /// Number of suites that produced a result.
    pub suites: usize,
    /// Sum of passed checks.
    pub passed: usize,
    /// Sum of failed checks.
    pub failed: usize,
    /// Sum of skipped checks.
    pub skipped: usize,
    /// Sum of suite durations.
    #[serde(serialize_with = "super::serialize_secs")]
    pub duration: Duration,
    /// Every suite succeeded and at least one suite ran.
    pub success: bool,
    /// Identifiers of unsuccessful suites, in run order.
    pub failed_suites: Vec<String>,
}

impl RunSummary {
    /// Aggregate `results`.
    ///
    /// An empty result list is reported as unsuccessful: a run that found
    /// nothing to execute must not read as green.
    #[must_use]
    pub fn from_results(results: &[SuiteResult]) -> Self {
        let failed_suites: Vec<String> = results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.suite.clone())
            .collect();

        Self {
            generated_at: Utc::now(),
            suites: results.len(),
            passed: results.iter().map(|r| r.passed).sum(),
            failed: results.iter().map(|r| r.failed).sum(),
            skipped: results.iter().map(|r| r.skipped).sum(),
            duration: results.iter().map(|r| r.duration).sum(),
            success: !results.is_empty() && failed_suites.is_empty(),
            failed_suites,
        }
    }

    /// No suite was run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.suites == 0
    }
}

/// The totals block printed at the end of a run, one `Label:  value` line
/// per field.
impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Finished: {}",
            self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        writeln!(f, "Suites:   {}", self.suites)?;
        writeln!(f, "Passed:   {}", self.passed)?;
        writeln!(f, "Failed:   {}", self.failed)?;
        writeln!(f, "Skipped:  {}", self.skipped)?;
        write!(f, "Duration: {:.1}s", self.duration.as_secs_f64())
    }
}
