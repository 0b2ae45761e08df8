//! Time sources.
//!
//! RTT is always measured on the local monotonic clock. The wall clock is
//! only used for the informational timestamp carried by `PONG` replies.

use std::time::Instant;

/// Microseconds from `start` to `end` on the monotonic clock.
///
/// Saturates at zero if `end` precedes `start`.
pub fn micros_between(start: Instant, end: Instant) -> u64 {
    let elapsed = end.saturating_duration_since(start);
    u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX)
}

/// Wall-clock microseconds since the Unix epoch.
pub fn wall_clock_micros() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

/// Fractional milliseconds for display.
pub fn micros_to_millis(micros: u64) -> f64 {
    micros as f64 / 1000.0
}
