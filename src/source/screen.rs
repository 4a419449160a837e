//! Screen source adapter

use super::producer::{FrameProducer, SourceTap};
use super::{AdapterShared, SourceAdapter, SourceStatus, Timestamper};
use crate::clock::ClockAnchor;
use crate::error::AttachError;
use crate::queue::{QueueHandle, QueueWriter};
use crate::record::{RecordPayload, SourceKind, TimestampedRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// Normalizes a push-driven frame producer into the common record stream.
pub struct ScreenAdapter {
    producer: Box<dyn FrameProducer>,
    shared: Arc<AdapterShared>,
    queue: Option<QueueHandle>,
}

impl ScreenAdapter {
    pub fn new(producer: Box<dyn FrameProducer>) -> Self {
        Self {
            producer,
            shared: AdapterShared::new(SourceKind::Screen),
            queue: None,
        }
    }
}

#[async_trait]
impl SourceAdapter for ScreenAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Screen
    }

    async fn start(&mut self, anchor: ClockAnchor, writer: QueueWriter) -> Result<(), AttachError> {
        self.shared.reset();
        self.queue = Some(writer.handle());
        let mut stamper = Timestamper::new(anchor, self.shared.clone());
        let shared = self.shared.clone();

        let tap = SourceTap::new(
            move |sample| {
                let (capture_time_ns, sequence_no) = stamper.stamp(sample.native_ts_ns);
                writer.push(TimestampedRecord {
                    source_kind: SourceKind::Screen,
                    capture_time_ns,
                    sequence_no,
                    payload: RecordPayload::VideoFrame(sample.payload),
                });
            },
            move |reason| shared.fail(reason),
        );

        self.producer.attach(tap)?;
        self.shared.set_attached(true);
        tracing::info!("screen adapter attached");
        Ok(())
    }

    async fn stop(&mut self) {
        self.producer.detach();
        self.shared.set_attached(false);
        // The producer drops its tap (and with it the queue writer) on
        // detach; the handle close covers a producer that doesn't.
        if let Some(queue) = self.queue.take() {
            queue.close();
        }
        tracing::info!("screen adapter detached");
    }

    fn status(&self) -> SourceStatus {
        self.shared.status()
    }
}
