//! Stream multiplexer
//!
//! Drains every ingest queue and routes records to their destination sinks:
//! screen and system audio to the container (one correlated track pair),
//! microphone to the WAV file, discrete events to the JSON-Lines log.
//! Per-source order is preserved end-to-end; event lines are additionally
//! sorted by capture time inside a bounded reorder window.

use crate::clock::ClockAnchor;
use crate::queue::QueueReader;
use crate::record::{EventRecord, RecordPayload, SourceKind, TimestampedRecord};
use crate::session::state::SessionEvent;
use crate::sink::SinkSet;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// What the multiplexer hands back once every queue has drained: the sinks
/// (for the coordinator to finalize) and the accounting.
pub struct MuxReport {
    pub sinks: SinkSet,
    pub written: HashMap<SourceKind, u64>,
    pub failed_sinks: Vec<&'static str>,
    /// Events that arrived later than the reorder window allows. They are
    /// written in arrival position rather than dropped.
    pub late_events: u64,
}

struct PendingEvent {
    capture_time_ns: i64,
    sequence_no: u64,
    kind: SourceKind,
    event: EventRecord,
}

impl PartialEq for PendingEvent {
    fn eq(&self, other: &Self) -> bool {
        self.capture_time_ns == other.capture_time_ns && self.sequence_no == other.sequence_no
    }
}

impl Eq for PendingEvent {}

impl PartialOrd for PendingEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.capture_time_ns, self.sequence_no).cmp(&(other.capture_time_ns, other.sequence_no))
    }
}

/// Holds event records until the watermark passes them, emitting in
/// capture-time order. Memory is bounded by the lateness window: anything
/// older than the already-emitted front is handed back for immediate
/// arrival-order write instead of being buffered.
pub(crate) struct ReorderBuffer {
    heap: BinaryHeap<Reverse<PendingEvent>>,
    emitted_front_ns: i64,
    late: u64,
}

impl ReorderBuffer {
    pub(crate) fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            emitted_front_ns: i64::MIN,
            late: 0,
        }
    }

    /// Buffer an event, or hand it back when it is already behind the
    /// emitted front (a straggler beyond the window).
    pub(crate) fn push(
        &mut self,
        entry: (i64, u64, SourceKind, EventRecord),
    ) -> Option<(i64, SourceKind, EventRecord)> {
        let (capture_time_ns, sequence_no, kind, event) = entry;
        if capture_time_ns < self.emitted_front_ns {
            self.late += 1;
            return Some((capture_time_ns, kind, event));
        }
        self.heap.push(Reverse(PendingEvent {
            capture_time_ns,
            sequence_no,
            kind,
            event,
        }));
        None
    }

    /// Emit every buffered event at or before the watermark, oldest first.
    pub(crate) fn drain_ready(&mut self, watermark_ns: i64) -> Vec<(i64, SourceKind, EventRecord)> {
        let mut ready = Vec::new();
        while let Some(Reverse(front)) = self.heap.peek() {
            if front.capture_time_ns > watermark_ns {
                break;
            }
            let Some(Reverse(front)) = self.heap.pop() else {
                break;
            };
            self.emitted_front_ns = front.capture_time_ns;
            ready.push((front.capture_time_ns, front.kind, front.event));
        }
        ready
    }

    /// Emit everything, for the final flush.
    pub(crate) fn drain_all(&mut self) -> Vec<(i64, SourceKind, EventRecord)> {
        self.drain_ready(i64::MAX)
    }

    pub(crate) fn late_count(&self) -> u64 {
        self.late
    }
}

struct MuxState {
    sinks: SinkSet,
    written: HashMap<SourceKind, u64>,
    reorder: ReorderBuffer,
    container_failed: bool,
    microphone_failed: bool,
    events_failed: bool,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl MuxState {
    fn count(&mut self, kind: SourceKind) {
        *self.written.entry(kind).or_insert(0) += 1;
    }

    fn sink_failed(&mut self, sink: &'static str, error: crate::error::SinkError) {
        tracing::error!("{} sink write failed, disabling: {}", sink, error);
        let _ = self.event_tx.send(SessionEvent::SinkFailed { sink });
        match sink {
            "container" => self.container_failed = true,
            "microphone" => self.microphone_failed = true,
            _ => self.events_failed = true,
        }
    }

    fn route(&mut self, record: TimestampedRecord) {
        match record.payload {
            RecordPayload::VideoFrame(frame) => {
                if self.container_failed {
                    return;
                }
                if let Some(container) = self.sinks.container.as_mut() {
                    match container.write_frame(&frame, record.capture_time_ns) {
                        Ok(()) => self.count(record.source_kind),
                        Err(e) => self.sink_failed("container", e),
                    }
                }
            }
            RecordPayload::AudioBlock(block) => match record.source_kind {
                SourceKind::Microphone => {
                    if self.microphone_failed {
                        return;
                    }
                    if let Some(microphone) = self.sinks.microphone.as_mut() {
                        match microphone.write_block(&block, record.capture_time_ns) {
                            Ok(()) => self.count(record.source_kind),
                            Err(e) => self.sink_failed("microphone", e),
                        }
                    }
                }
                _ => {
                    if self.container_failed {
                        return;
                    }
                    if let Some(container) = self.sinks.container.as_mut() {
                        match container.write_audio(&block, record.capture_time_ns) {
                            Ok(()) => self.count(record.source_kind),
                            Err(e) => self.sink_failed("container", e),
                        }
                    }
                }
            },
            RecordPayload::Event(event) => {
                let straggler = self.reorder.push((
                    record.capture_time_ns,
                    record.sequence_no,
                    record.source_kind,
                    event,
                ));
                if let Some((ts, kind, event)) = straggler {
                    tracing::warn!(
                        "{} event {}ns beyond the reorder window, written out of order",
                        kind,
                        ts
                    );
                    self.write_event(ts, kind, &event);
                }
            }
        }
    }

    fn write_event(&mut self, capture_time_ns: i64, kind: SourceKind, event: &EventRecord) {
        if self.events_failed {
            return;
        }
        if let Some(events) = self.sinks.events.as_mut() {
            match events.write_event(capture_time_ns, event) {
                Ok(()) => self.count(kind),
                Err(e) => self.sink_failed("events", e),
            }
        }
    }

    fn flush_events(&mut self, watermark_ns: i64) {
        for (ts, kind, event) in self.reorder.drain_ready(watermark_ns) {
            self.write_event(ts, kind, &event);
        }
    }

    fn flush_all_events(&mut self) {
        for (ts, kind, event) in self.reorder.drain_all() {
            self.write_event(ts, kind, &event);
        }
    }
}

/// Spawn the multiplexer task. It runs until every queue is closed and
/// drained, then returns the sinks and accounting to the coordinator.
pub fn spawn(
    readers: Vec<QueueReader>,
    sinks: SinkSet,
    anchor: ClockAnchor,
    reorder_window: Duration,
    event_tx: broadcast::Sender<SessionEvent>,
) -> JoinHandle<MuxReport> {
    tokio::spawn(run(readers, sinks, anchor, reorder_window, event_tx))
}

async fn run(
    readers: Vec<QueueReader>,
    sinks: SinkSet,
    anchor: ClockAnchor,
    reorder_window: Duration,
    event_tx: broadcast::Sender<SessionEvent>,
) -> MuxReport {
    let (merged_tx, mut merged_rx) = mpsc::channel::<TimestampedRecord>(256);
    for mut reader in readers {
        let merged_tx = merged_tx.clone();
        tokio::spawn(async move {
            while let Some(record) = reader.recv().await {
                if merged_tx.send(record).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(merged_tx);

    let mut state = MuxState {
        sinks,
        written: HashMap::new(),
        reorder: ReorderBuffer::new(),
        container_failed: false,
        microphone_failed: false,
        events_failed: false,
        event_tx,
    };

    let window_ns = reorder_window.as_nanos() as i64;
    let flush_period = (reorder_window / 4)
        .max(Duration::from_millis(10))
        .min(Duration::from_millis(250));
    let mut flush_ticks = tokio::time::interval(flush_period);
    flush_ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            maybe = merged_rx.recv() => match maybe {
                Some(record) => state.route(record),
                None => break,
            },
            _ = flush_ticks.tick() => {
                let watermark = anchor.elapsed_ns() - window_ns;
                state.flush_events(watermark);
            }
        }
    }

    // Every producer is gone; whatever is still buffered is final.
    state.flush_all_events();

    let failed_sinks = {
        let mut failed = Vec::new();
        if state.container_failed {
            failed.push("container");
        }
        if state.microphone_failed {
            failed.push("microphone");
        }
        if state.events_failed {
            failed.push("events");
        }
        failed
    };

    MuxReport {
        late_events: state.reorder.late_count(),
        written: state.written,
        failed_sinks,
        sinks: state.sinks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(ts: i64, seq: u64) -> (i64, u64, SourceKind, EventRecord) {
        (
            ts,
            seq,
            SourceKind::Bluetooth,
            EventRecord::bluetooth("dev", -40),
        )
    }

    #[test]
    fn test_reorder_sorts_within_window() {
        let mut buffer = ReorderBuffer::new();
        assert!(buffer.push(event(300, 2)).is_none());
        assert!(buffer.push(event(100, 0)).is_none());
        assert!(buffer.push(event(200, 1)).is_none());

        let ready = buffer.drain_ready(250);
        let times: Vec<i64> = ready.iter().map(|(ts, _, _)| *ts).collect();
        assert_eq!(times, vec![100, 200]);

        let rest = buffer.drain_all();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].0, 300);
    }

    #[test]
    fn test_reorder_holds_events_past_watermark() {
        let mut buffer = ReorderBuffer::new();
        buffer.push(event(1_000, 0));
        assert!(buffer.drain_ready(500).is_empty());
        assert_eq!(buffer.drain_ready(1_000).len(), 1);
    }

    #[test]
    fn test_straggler_behind_emitted_front_is_returned() {
        let mut buffer = ReorderBuffer::new();
        buffer.push(event(1_000, 0));
        buffer.drain_ready(2_000);

        let straggler = buffer.push(event(500, 1));
        assert!(straggler.is_some());
        assert_eq!(buffer.late_count(), 1);
    }

    #[test]
    fn test_equal_timestamps_keep_sequence_order() {
        let mut buffer = ReorderBuffer::new();
        buffer.push(event(100, 1));
        buffer.push(event(100, 0));
        let ready = buffer.drain_all();
        let times: Vec<i64> = ready.iter().map(|(ts, _, _)| *ts).collect();
        assert_eq!(times, vec![100, 100]);
    }
}
