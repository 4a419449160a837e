//! Shared fakes for lifecycle tests: counting sinks and a counting
//! stay-awake primitive.

use crate::error::SinkError;
use crate::guard::StayAwake;
use crate::record::{AudioBlock, EventRecord, VideoFrame};
use crate::session::coordinator::AwakeFactory;
use crate::sink::{
    AudioFileSink, ContainerOptions, ContainerSink, EventSink, SinkFactory,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared by every sink a [`MockSinkFactory`] opens.
#[derive(Default)]
pub struct SinkCounters {
    pub frames: AtomicU64,
    pub audio_blocks: AtomicU64,
    pub mic_blocks: AtomicU64,
    pub events: AtomicU64,
    pub container_finalized: AtomicU64,
    pub microphone_finalized: AtomicU64,
    pub events_finalized: AtomicU64,
    pub event_lines: Mutex<Vec<(i64, EventRecord)>>,
}

impl SinkCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

pub struct MockSinkFactory {
    pub counters: Arc<SinkCounters>,
    pub fail_container_open: bool,
}

impl MockSinkFactory {
    pub fn new(counters: Arc<SinkCounters>) -> Self {
        Self {
            counters,
            fail_container_open: false,
        }
    }
}

impl SinkFactory for MockSinkFactory {
    fn open_container(
        &mut self,
        _path: &Path,
        _options: &ContainerOptions,
    ) -> Result<Box<dyn ContainerSink>, SinkError> {
        if self.fail_container_open {
            return Err(SinkError::Encoder("container unavailable".into()));
        }
        Ok(Box::new(MockContainerSink {
            counters: self.counters.clone(),
        }))
    }

    fn open_audio_file(
        &mut self,
        _path: &Path,
        _sample_rate: u32,
        _channels: u16,
    ) -> Result<Box<dyn AudioFileSink>, SinkError> {
        Ok(Box::new(MockAudioSink {
            counters: self.counters.clone(),
        }))
    }

    fn open_event_log(&mut self, _path: &Path) -> Result<Box<dyn EventSink>, SinkError> {
        Ok(Box::new(MockEventSink {
            counters: self.counters.clone(),
        }))
    }
}

struct MockContainerSink {
    counters: Arc<SinkCounters>,
}

impl ContainerSink for MockContainerSink {
    fn write_frame(&mut self, _frame: &VideoFrame, _capture_time_ns: i64) -> Result<(), SinkError> {
        self.counters.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write_audio(&mut self, _block: &AudioBlock, _capture_time_ns: i64) -> Result<(), SinkError> {
        self.counters.audio_blocks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        self.counters.container_finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockAudioSink {
    counters: Arc<SinkCounters>,
}

impl AudioFileSink for MockAudioSink {
    fn write_block(&mut self, _block: &AudioBlock, _capture_time_ns: i64) -> Result<(), SinkError> {
        self.counters.mic_blocks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        self.counters
            .microphone_finalized
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockEventSink {
    counters: Arc<SinkCounters>,
}

impl EventSink for MockEventSink {
    fn write_event(&mut self, capture_time_ns: i64, event: &EventRecord) -> Result<(), SinkError> {
        self.counters.events.fetch_add(1, Ordering::SeqCst);
        self.counters
            .event_lines
            .lock()
            .push((capture_time_ns, event.clone()));
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        self.counters.events_finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct CountingAwake {
    acquires: Arc<AtomicU64>,
    releases: Arc<AtomicU64>,
}

impl StayAwake for CountingAwake {
    fn acquire(&mut self) -> Result<(), String> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Awake factory whose acquire/release totals are observable from outside.
pub fn counting_awake(acquires: Arc<AtomicU64>, releases: Arc<AtomicU64>) -> AwakeFactory {
    Box::new(move || {
        Box::new(CountingAwake {
            acquires: acquires.clone(),
            releases: releases.clone(),
        })
    })
}
