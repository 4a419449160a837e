//! Source adapters
//!
//! The normalization layer between the native capture producers and the
//! common record format. One adapter per stream kind; all four hide behind
//! the same trait, including the polled Bluetooth scanner.

pub mod audio;
pub mod bluetooth;
pub mod producer;
pub mod screen;
pub mod synthetic;

use crate::clock::ClockAnchor;
use crate::error::AttachError;
use crate::queue::QueueWriter;
use crate::record::SourceKind;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

pub use audio::AudioSourceAdapter;
pub use bluetooth::BluetoothAdapter;
pub use screen::ScreenAdapter;

/// Uniform interface over the four heterogeneous capture sources.
///
/// `start` attaches the external producer and begins delivering records
/// into the given queue; failure to attach is reported, never a panic.
/// `stop` detaches and guarantees producer resources are released even when
/// invoked after an upstream failure.
#[async_trait]
pub trait SourceAdapter: Send {
    fn kind(&self) -> SourceKind;

    async fn start(&mut self, anchor: ClockAnchor, writer: QueueWriter) -> Result<(), AttachError>;

    async fn stop(&mut self);

    fn status(&self) -> SourceStatus;
}

/// Observable per-source state, surfaced to the session state machine.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub kind: SourceKind,
    pub attached: bool,
    /// Ordering-invariant violations reported by the producer.
    pub violations: u64,
    pub failure: Option<String>,
}

/// State shared between an adapter and the delivery path running on the
/// producer's thread.
#[derive(Debug)]
pub(crate) struct AdapterShared {
    kind: SourceKind,
    attached: AtomicBool,
    violations: AtomicU64,
    failure: Mutex<Option<String>>,
}

impl AdapterShared {
    pub(crate) fn new(kind: SourceKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            attached: AtomicBool::new(false),
            violations: AtomicU64::new(0),
            failure: Mutex::new(None),
        })
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::SeqCst);
    }

    /// Clear per-session state so the adapter can serve a new session.
    pub(crate) fn reset(&self) {
        self.attached.store(false, Ordering::SeqCst);
        self.violations.store(0, Ordering::Relaxed);
        *self.failure.lock() = None;
    }

    pub(crate) fn record_violation(&self) {
        self.violations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn fail(&self, reason: String) {
        tracing::error!("{} producer failed: {}", self.kind, reason);
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(reason);
        }
    }

    pub(crate) fn status(&self) -> SourceStatus {
        SourceStatus {
            kind: self.kind,
            attached: self.attached.load(Ordering::SeqCst),
            violations: self.violations.load(Ordering::Relaxed),
            failure: self.failure.lock().clone(),
        }
    }
}

/// Stamps each delivered payload with its anchor-relative capture time and
/// per-source sequence number.
///
/// The first sample fixes the producer's clock epoch: its native timestamp
/// becomes the zero point and the anchor-relative arrival instant becomes
/// the attach offset, removing cross-source skew from adapters starting at
/// different real times.
pub(crate) struct Timestamper {
    anchor: ClockAnchor,
    shared: Arc<AdapterShared>,
    native_start: Option<i64>,
    attach_offset_ns: i64,
    next_seq: u64,
    last_capture_ns: i64,
}

impl Timestamper {
    pub(crate) fn new(anchor: ClockAnchor, shared: Arc<AdapterShared>) -> Self {
        Self {
            anchor,
            shared,
            native_start: None,
            attach_offset_ns: 0,
            next_seq: 0,
            last_capture_ns: i64::MIN,
        }
    }

    /// Assign `(capture_time_ns, sequence_no)` for a native timestamp.
    pub(crate) fn stamp(&mut self, native_ts_ns: i64) -> (i64, u64) {
        let native_start = match self.native_start {
            Some(start) => start,
            None => {
                self.attach_offset_ns = self.anchor.elapsed_ns();
                self.native_start = Some(native_ts_ns);
                native_ts_ns
            }
        };

        let capture = ClockAnchor::translate(native_ts_ns, native_start, self.attach_offset_ns);
        if capture < self.last_capture_ns {
            // Producer clock ran backwards: a producer bug. Reported and
            // forwarded as-is, never rewritten.
            self.shared.record_violation();
            tracing::error!(
                "{} capture time regressed: {} < {}",
                self.shared.kind,
                capture,
                self.last_capture_ns
            );
        } else {
            self.last_capture_ns = capture;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        (capture, seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_lands_on_attach_offset() {
        let anchor = ClockAnchor::establish();
        let shared = AdapterShared::new(SourceKind::Screen);
        let mut stamper = Timestamper::new(anchor, shared);

        std::thread::sleep(std::time::Duration::from_millis(5));
        let (ts, seq) = stamper.stamp(1_000_000);
        assert_eq!(seq, 0);
        // Attach offset is the anchor-relative arrival of the first sample.
        assert!(ts >= 5_000_000);
    }

    #[test]
    fn test_deltas_follow_native_clock() {
        let anchor = ClockAnchor::establish();
        let shared = AdapterShared::new(SourceKind::SystemAudio);
        let mut stamper = Timestamper::new(anchor, shared);

        let (first, _) = stamper.stamp(10_000);
        let (second, seq) = stamper.stamp(10_000 + 33_333_333);
        assert_eq!(second - first, 33_333_333);
        assert_eq!(seq, 1);
    }

    #[test]
    fn test_regression_is_counted_not_fixed() {
        let anchor = ClockAnchor::establish();
        let shared = AdapterShared::new(SourceKind::Microphone);
        let mut stamper = Timestamper::new(anchor, shared.clone());

        stamper.stamp(1_000_000_000);
        let (ts, _) = stamper.stamp(999_000_000);
        let status = shared.status();
        assert_eq!(status.violations, 1);
        // The regressed value passes through unmodified.
        let (later, _) = stamper.stamp(1_000_000_000);
        assert!(ts < later);
    }

    #[test]
    fn test_adapters_attached_apart_converge_on_shared_instants() {
        // Two producers observe the same real instants through clock
        // domains with different epochs, and attach at different real
        // times. After translation both land on the same anchor-relative
        // value, within scheduling jitter.
        let anchor = ClockAnchor::establish();
        let bias_a = 5_000_000_000;
        let bias_b = -3_000_000_000;

        let mut early = Timestamper::new(anchor, AdapterShared::new(SourceKind::Screen));
        let _ = early.stamp(anchor.elapsed_ns() + bias_a);

        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut late = Timestamper::new(anchor, AdapterShared::new(SourceKind::Microphone));
        let _ = late.stamp(anchor.elapsed_ns() + bias_b);

        std::thread::sleep(std::time::Duration::from_millis(10));
        let instant = anchor.elapsed_ns();
        let (from_early, _) = early.stamp(instant + bias_a);
        let (from_late, _) = late.stamp(instant + bias_b);

        let tolerance = 100_000_000;
        assert!((from_early - from_late).abs() < tolerance);
        assert!((from_early - instant).abs() < tolerance);
    }

    #[test]
    fn test_sequence_strictly_increases() {
        let anchor = ClockAnchor::establish();
        let shared = AdapterShared::new(SourceKind::Bluetooth);
        let mut stamper = Timestamper::new(anchor, shared);
        let seqs: Vec<u64> = (0..5).map(|i| stamper.stamp(i * 100).1).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_fault_is_sticky_first_wins() {
        let shared = AdapterShared::new(SourceKind::Screen);
        shared.fail("device lost".into());
        shared.fail("later noise".into());
        assert_eq!(shared.status().failure.as_deref(), Some("device lost"));
    }
}
