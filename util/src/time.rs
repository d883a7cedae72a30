//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if the nanosecond
/// count overflows.
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Returns true if at least `interval_s` seconds have passed between `since_s` and `now_s`.
///
/// A `None` start time is treated as "never happened", so the interval is always considered to
/// have elapsed.
pub fn elapsed_at_least(since_s: Option<f64>, now_s: f64, interval_s: f64) -> bool {
    match since_s {
        Some(t) => now_s - t >= interval_s,
        None => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }

    #[test]
    fn test_elapsed_at_least() {
        assert!(elapsed_at_least(None, 0.0, 10.0));
        assert!(elapsed_at_least(Some(1.0), 1.05, 0.05));
        assert!(!elapsed_at_least(Some(1.0), 1.04, 0.05));
    }
}
