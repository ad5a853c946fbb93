//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert seconds into a std duration, or `None` if negative, non-finite or too large.
pub fn checked_seconds_to_std_duration(seconds: f64) -> Option<std::time::Duration> {
    if seconds.is_finite() && seconds >= 0.0 {
        std::time::Duration::try_from_secs_f64(seconds).ok()
    }
    else {
        None
    }
}

/// Convert seconds into a std duration, negative and non-finite values give a zero duration and
/// values too large to represent saturate.
pub fn seconds_to_std_duration(seconds: f64) -> std::time::Duration {
    checked_seconds_to_std_duration(seconds).unwrap_or_else(|| {
        if seconds > 0.0 {
            std::time::Duration::MAX
        }
        else {
            std::time::Duration::from_secs(0)
        }
    })
}
