//! Session clock anchor
//!
//! Every stream in a session reports timestamps in its producer's own clock
//! domain (frame-presentation clock, audio-device clock, scan-callback
//! clock). The anchor is the single monotonic origin those domains are
//! translated into, so "simultaneous" events across sources agree.

use chrono::{DateTime, Utc};
use std::time::Instant;

/// Shared monotonic time origin for one session.
///
/// Established exactly once, before any adapter starts producing records.
/// The wall-clock half exists for display and file naming only; all relative
/// math uses the monotonic tick.
#[derive(Debug, Clone, Copy)]
pub struct ClockAnchor {
    origin: Instant,
    wall: DateTime<Utc>,
}

impl ClockAnchor {
    /// Capture the monotonic tick / wall-clock pair that defines the session
    /// epoch.
    pub fn establish() -> Self {
        Self {
            origin: Instant::now(),
            wall: Utc::now(),
        }
    }

    /// Nanoseconds elapsed since the anchor on the shared monotonic clock.
    pub fn elapsed_ns(&self) -> i64 {
        self.origin.elapsed().as_nanos() as i64
    }

    /// Wall-clock instant the anchor corresponds to (display only).
    pub fn wall_time(&self) -> DateTime<Utc> {
        self.wall
    }

    /// Translate a producer-native timestamp into the anchor domain.
    ///
    /// `native_start` is the native timestamp of the adapter's first sample
    /// and `attach_offset_ns` the anchor-relative instant that sample
    /// arrived. The producer's clock only ever contributes deltas, so skew
    /// between its epoch and ours cancels out.
    pub fn translate(native_ts: i64, native_start: i64, attach_offset_ns: i64) -> i64 {
        (native_ts - native_start) + attach_offset_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_elapsed_is_monotonic() {
        let anchor = ClockAnchor::establish();
        let a = anchor.elapsed_ns();
        std::thread::sleep(Duration::from_millis(5));
        let b = anchor.elapsed_ns();
        assert!(b > a);
    }

    #[test]
    fn test_translate_cancels_producer_epoch() {
        // Two producers observe the same instant but report it in clock
        // domains with wildly different epochs. After translation both land
        // on their attach offset plus the same delta.
        let offset_a = 1_000_000;
        let offset_b = 9_000_000;

        let a = ClockAnchor::translate(500_000_000_100, 500_000_000_000, offset_a);
        let b = ClockAnchor::translate(100, 0, offset_b);

        assert_eq!(a, offset_a + 100);
        assert_eq!(b, offset_b + 100);
    }

    #[test]
    fn test_translate_first_sample_is_attach_offset() {
        let ts = ClockAnchor::translate(42, 42, 7_500);
        assert_eq!(ts, 7_500);
    }
}
