//! Domain model module declarations.

use std::time::Duration;

use serde::Serializer;

pub mod outcome;
pub mod suite;
pub mod summary;

pub use outcome::{TestOutcome, TestStatus};
pub use suite::{ResultSource, SuiteResult};
pub use summary::RunSummary;

/// Serialize a [`Duration`] as fractional seconds.
pub(crate) fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Convert wire seconds into a [`Duration`], rejecting negative or
/// non-finite values.
#[must_use]
pub fn duration_from_secs(secs: f64) -> Option<Duration> {
    if secs.is_finite() && secs >= 0.0 {
        Duration::try_from_secs_f64(secs).ok()
    } else {
        None
    }
}

/// Human form of a duration in seconds: `60s` for whole seconds, `0.5s` or
/// `1.25s` otherwise, without trailing zeros.
#[must_use]
pub fn format_secs(duration: Duration) -> String {
    if duration.subsec_nanos() == 0 {
        return format!("{}s", duration.as_secs());
    }
    let text = format!("{:.6}", duration.as_secs_f64());
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}s")
}
