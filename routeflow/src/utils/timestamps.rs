//! Timestamp and duration helpers.

use chrono::Utc;
use std::time::{Duration, Instant};

/// Returns the current UTC time as an ISO 8601 string
/// (`YYYY-MM-DDTHH:MM:SS.ffffff+00:00`).
///
/// # Examples
///
/// ```
/// use routeflow::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Milliseconds elapsed since `started`.
#[must_use]
pub fn elapsed_ms(started: Instant) -> u64 {
    duration_ms(started.elapsed())
}
