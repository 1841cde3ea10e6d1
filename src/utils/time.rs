//! Capture timestamp helpers.
//!
//! Capture timestamps are carried as a `Duration` since the Unix epoch, which is
//! what a pcap `timeval` denotes.

use std::time::Duration;

/// Convert a `timeval`-style (seconds, microseconds) pair
pub fn from_timeval(secs: u64, micros: u32) -> Duration {
    Duration::from_secs(secs) + Duration::from_micros(u64::from(micros))
}

/// Split a capture timestamp back into (seconds, microseconds)
pub fn to_timeval(ts: Duration) -> (u64, u32) {
    (ts.as_secs(), ts.subsec_micros())
}

/// Elapsed time between two capture timestamps, zero if they run backwards
pub fn elapsed_between(begin: Duration, end: Duration) -> Duration {
    end.saturating_sub(begin)
}
