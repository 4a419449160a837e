//! External producer contracts
//!
//! The OS-level capture mechanisms live outside this crate. Each one is
//! reduced to the same minimal shape: attach, deliver native-timestamped
//! payloads, signal a fault if it dies, detach. Native timestamps are in the
//! producer's own clock domain; only deltas are meaningful to the engine.

use crate::error::AttachError;
use crate::record::{AudioBlock, VideoFrame};

/// A producer-native sample: payload plus the producer-clock timestamp it
/// was captured at.
#[derive(Debug, Clone)]
pub struct Sample<T> {
    pub native_ts_ns: i64,
    pub payload: T,
}

/// Delivery path handed to a push producer at attach time.
///
/// The producer calls `push` from whatever thread its native callback runs
/// on, and `fail` (at most once) if it dies mid-session.
pub struct SourceTap<T> {
    push: Box<dyn FnMut(Sample<T>) + Send>,
    fail: Box<dyn FnMut(String) + Send>,
}

impl<T> SourceTap<T> {
    pub fn new(
        push: impl FnMut(Sample<T>) + Send + 'static,
        fail: impl FnMut(String) + Send + 'static,
    ) -> Self {
        Self {
            push: Box::new(push),
            fail: Box::new(fail),
        }
    }

    pub fn push(&mut self, sample: Sample<T>) {
        (self.push)(sample);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        (self.fail)(reason.into());
    }
}

/// Screen frame producer (push-driven at its own cadence).
pub trait FrameProducer: Send {
    fn attach(&mut self, tap: SourceTap<VideoFrame>) -> Result<(), AttachError>;

    /// Stop delivering and release producer resources. Must be safe to call
    /// after a fault.
    fn detach(&mut self);
}

/// Audio sample producer (system loopback or microphone, push-driven at
/// device-callback cadence).
pub trait AudioProducer: Send {
    fn attach(&mut self, tap: SourceTap<AudioBlock>) -> Result<(), AttachError>;

    fn detach(&mut self);
}

/// One RSSI observation from the scanner.
#[derive(Debug, Clone)]
pub struct BluetoothReading {
    pub native_ts_ns: i64,
    pub device: String,
    pub rssi: i16,
}

/// Bluetooth RSSI scanner, polled at a fixed interval rather than pushing.
pub trait BluetoothScanner: Send {
    fn attach(&mut self) -> Result<(), AttachError>;

    /// Readings observed since the previous poll. An `Err` means the
    /// scanner died and will not recover.
    fn poll(&mut self) -> Result<Vec<BluetoothReading>, String>;

    fn detach(&mut self);
}
