//! Audio source adapters
//!
//! System-loopback audio and the microphone share one adapter over the
//! `AudioProducer` contract; only the stream kind differs.

use super::producer::{AudioProducer, SourceTap};
use super::{AdapterShared, SourceAdapter, SourceStatus, Timestamper};
use crate::clock::ClockAnchor;
use crate::error::AttachError;
use crate::queue::{QueueHandle, QueueWriter};
use crate::record::{RecordPayload, SourceKind, TimestampedRecord};
use async_trait::async_trait;
use std::sync::Arc;

pub struct AudioSourceAdapter {
    kind: SourceKind,
    producer: Box<dyn AudioProducer>,
    shared: Arc<AdapterShared>,
    queue: Option<QueueHandle>,
}

impl AudioSourceAdapter {
    pub fn system_audio(producer: Box<dyn AudioProducer>) -> Self {
        Self::new(SourceKind::SystemAudio, producer)
    }

    pub fn microphone(producer: Box<dyn AudioProducer>) -> Self {
        Self::new(SourceKind::Microphone, producer)
    }

    fn new(kind: SourceKind, producer: Box<dyn AudioProducer>) -> Self {
        Self {
            kind,
            producer,
            shared: AdapterShared::new(kind),
            queue: None,
        }
    }
}

#[async_trait]
impl SourceAdapter for AudioSourceAdapter {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn start(&mut self, anchor: ClockAnchor, writer: QueueWriter) -> Result<(), AttachError> {
        self.shared.reset();
        self.queue = Some(writer.handle());
        let kind = self.kind;
        let mut stamper = Timestamper::new(anchor, self.shared.clone());
        let shared = self.shared.clone();

        let tap = SourceTap::new(
            move |sample| {
                let (capture_time_ns, sequence_no) = stamper.stamp(sample.native_ts_ns);
                writer.push(TimestampedRecord {
                    source_kind: kind,
                    capture_time_ns,
                    sequence_no,
                    payload: RecordPayload::AudioBlock(sample.payload),
                });
            },
            move |reason| shared.fail(reason),
        );

        self.producer.attach(tap)?;
        self.shared.set_attached(true);
        tracing::info!("{} adapter attached", self.kind);
        Ok(())
    }

    async fn stop(&mut self) {
        self.producer.detach();
        self.shared.set_attached(false);
        if let Some(queue) = self.queue.take() {
            queue.close();
        }
        tracing::info!("{} adapter detached", self.kind);
    }

    fn status(&self) -> SourceStatus {
        self.shared.status()
    }
}
