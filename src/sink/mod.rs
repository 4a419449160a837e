//! Output sinks
//!
//! Thin adapters over the artifact writers: the video + system-audio
//! container, the microphone WAV file, and the JSON-Lines event log. The
//! multiplexer owns open sinks while records flow; the session coordinator
//! takes them back for the close/finalize call.

pub mod container;
pub mod events;
pub mod wav;

use crate::config::{ContainerFormat, Quality};
use crate::error::SinkError;
use crate::record::{AudioBlock, EventRecord, VideoFrame};
use std::path::Path;

pub use container::FfmpegContainerSink;
pub use events::JsonlEventSink;
pub use wav::HoundWavSink;

/// Encoder parameters for the container sink.
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    pub fps: u32,
    pub quality: Quality,
    pub format: ContainerFormat,
}

/// Video + system-audio container. The two tracks stay a correlated pair
/// inside one artifact.
pub trait ContainerSink: Send {
    fn write_frame(&mut self, frame: &VideoFrame, capture_time_ns: i64) -> Result<(), SinkError>;

    fn write_audio(&mut self, block: &AudioBlock, capture_time_ns: i64) -> Result<(), SinkError>;

    /// Finalize into a playable file. Reached on the failure path too, so
    /// implementations finish whatever can be finished.
    fn finalize(&mut self) -> Result<(), SinkError>;
}

/// Standalone mono/stereo audio artifact (microphone track).
pub trait AudioFileSink: Send {
    fn write_block(&mut self, block: &AudioBlock, capture_time_ns: i64) -> Result<(), SinkError>;

    fn finalize(&mut self) -> Result<(), SinkError>;
}

/// Append-only JSON-Lines log for discrete events.
pub trait EventSink: Send {
    fn write_event(&mut self, capture_time_ns: i64, event: &EventRecord) -> Result<(), SinkError>;

    fn finalize(&mut self) -> Result<(), SinkError>;
}

/// Opens sinks at session start. Swappable so the engine can be driven
/// against in-memory sinks.
pub trait SinkFactory: Send {
    fn open_container(
        &mut self,
        path: &Path,
        options: &ContainerOptions,
    ) -> Result<Box<dyn ContainerSink>, SinkError>;

    fn open_audio_file(
        &mut self,
        path: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn AudioFileSink>, SinkError>;

    fn open_event_log(&mut self, path: &Path) -> Result<Box<dyn EventSink>, SinkError>;
}

/// Default factory producing the filesystem-backed sinks.
pub struct FsSinkFactory;

impl SinkFactory for FsSinkFactory {
    fn open_container(
        &mut self,
        path: &Path,
        options: &ContainerOptions,
    ) -> Result<Box<dyn ContainerSink>, SinkError> {
        Ok(Box::new(FfmpegContainerSink::open(path, options.clone())?))
    }

    fn open_audio_file(
        &mut self,
        path: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Box<dyn AudioFileSink>, SinkError> {
        Ok(Box::new(HoundWavSink::open(path, sample_rate, channels)?))
    }

    fn open_event_log(&mut self, path: &Path) -> Result<Box<dyn EventSink>, SinkError> {
        Ok(Box::new(JsonlEventSink::open(path)?))
    }
}

/// The set of sinks open for one session. Any of them may be absent when
/// the corresponding streams are disabled or skipped.
pub struct SinkSet {
    pub container: Option<Box<dyn ContainerSink>>,
    pub microphone: Option<Box<dyn AudioFileSink>>,
    pub events: Option<Box<dyn EventSink>>,
}

impl SinkSet {
    pub fn empty() -> Self {
        Self {
            container: None,
            microphone: None,
            events: None,
        }
    }
}
