//! Bounded ingest queues
//!
//! One queue per source decouples producer cadence from writer cadence.
//! Producers push from their own native threads (blocking, bounded); the
//! multiplexer drains asynchronously with wake-on-enqueue. Strictly FIFO,
//! single producer, single consumer.

use crate::record::{SourceKind, TimestampedRecord};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// What to do with a record arriving at a full queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest buffered record to make room. For high-rate,
    /// loss-tolerant streams: a dropped screen frame is recoverable.
    DropOldest,
    /// Block the producer up to the given duration waiting for room, then
    /// discard the incoming record. For loss-intolerant streams where
    /// unbounded blocking would stall the producer's device callback.
    BlockWithTimeout(Duration),
}

/// Observable queue counters.
///
/// `produced` counts every record the adapter offered; `dropped` counts
/// every record discarded by the overflow policy (evicted or timed out).
/// Records that reach the sink always equal `produced - dropped`.
#[derive(Debug, Default)]
pub struct QueueStats {
    produced: AtomicU64,
    dropped: AtomicU64,
}

impl QueueStats {
    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

struct State {
    buf: VecDeque<TimestampedRecord>,
    closed: bool,
}

struct Shared {
    kind: SourceKind,
    capacity: usize,
    policy: OverflowPolicy,
    state: Mutex<State>,
    not_full: Condvar,
    not_empty: Notify,
    stats: QueueStats,
}

/// Producer half. Moved into the producer's delivery path; dropping it
/// closes the queue so the reader can drain to empty and finish.
pub struct QueueWriter {
    shared: Arc<Shared>,
}

/// Control handle kept by the source adapter: stats and forced close,
/// without write access.
#[derive(Clone)]
pub struct QueueHandle {
    shared: Arc<Shared>,
}

/// Consumer half, owned by the multiplexer.
pub struct QueueReader {
    shared: Arc<Shared>,
}

/// Create a bounded FIFO queue for one source.
pub fn ingest_queue(
    kind: SourceKind,
    capacity: usize,
    policy: OverflowPolicy,
) -> (QueueWriter, QueueReader) {
    let shared = Arc::new(Shared {
        kind,
        capacity: capacity.max(1),
        policy,
        state: Mutex::new(State {
            buf: VecDeque::with_capacity(capacity.max(1)),
            closed: false,
        }),
        not_full: Condvar::new(),
        not_empty: Notify::new(),
        stats: QueueStats::default(),
    });
    (
        QueueWriter {
            shared: shared.clone(),
        },
        QueueReader { shared },
    )
}

impl QueueWriter {
    /// Control handle for the adapter side.
    pub fn handle(&self) -> QueueHandle {
        QueueHandle {
            shared: self.shared.clone(),
        }
    }

    /// Offer a record, applying the overflow policy if the queue is full.
    ///
    /// Returns `false` if the queue was already closed and the record was
    /// discarded uncounted (a trailing sample racing a detach).
    pub fn push(&self, record: TimestampedRecord) -> bool {
        let shared = &self.shared;
        let mut state = shared.state.lock();
        if state.closed {
            return false;
        }
        shared.stats.produced.fetch_add(1, Ordering::Relaxed);

        if state.buf.len() >= shared.capacity {
            match shared.policy {
                OverflowPolicy::DropOldest => {
                    state.buf.pop_front();
                    shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("{} queue full, evicted oldest record", shared.kind);
                }
                OverflowPolicy::BlockWithTimeout(timeout) => {
                    let deadline = std::time::Instant::now() + timeout;
                    while state.buf.len() >= shared.capacity && !state.closed {
                        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
                        if remaining.is_zero()
                            || shared.not_full.wait_for(&mut state, remaining).timed_out()
                        {
                            break;
                        }
                    }
                    if state.closed {
                        shared.stats.produced.fetch_sub(1, Ordering::Relaxed);
                        return false;
                    }
                    if state.buf.len() >= shared.capacity {
                        shared.stats.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(
                            "{} queue full after {:?} wait, record discarded",
                            shared.kind,
                            timeout
                        );
                        return true;
                    }
                }
            }
        }

        state.buf.push_back(record);
        drop(state);
        shared.not_empty.notify_one();
        true
    }

    /// Close the queue. The reader drains whatever is buffered, then ends.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl Drop for QueueWriter {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl QueueHandle {
    pub fn kind(&self) -> SourceKind {
        self.shared.kind
    }

    pub fn stats(&self) -> &QueueStats {
        &self.shared.stats
    }

    /// Force-close from the adapter side, e.g. when a producer refuses to
    /// give the writer back within the stop grace period.
    pub fn close(&self) {
        self.shared.close();
    }
}

impl Shared {
    fn close(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.closed = true;
            drop(state);
            self.not_full.notify_all();
            self.not_empty.notify_one();
        }
    }
}

impl QueueReader {
    pub fn kind(&self) -> SourceKind {
        self.shared.kind
    }

    /// Receive the next record in FIFO order, waiting for an enqueue if the
    /// queue is empty. Returns `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<TimestampedRecord> {
        loop {
            {
                let mut state = self.shared.state.lock();
                if let Some(record) = state.buf.pop_front() {
                    drop(state);
                    self.shared.not_full.notify_one();
                    return Some(record);
                }
                if state.closed {
                    return None;
                }
            }
            // notify_one stores a permit, so a push racing this await is
            // never lost.
            self.shared.not_empty.notified().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EventRecord, RecordPayload};

    fn record(seq: u64) -> TimestampedRecord {
        TimestampedRecord {
            source_kind: SourceKind::Bluetooth,
            capture_time_ns: seq as i64 * 1_000,
            sequence_no: seq,
            payload: RecordPayload::Event(EventRecord::bluetooth("dev", -40)),
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let (writer, mut reader) = ingest_queue(SourceKind::Bluetooth, 8, OverflowPolicy::DropOldest);
        for seq in 0..5 {
            assert!(writer.push(record(seq)));
        }
        for seq in 0..5 {
            let rec = reader.recv().await.unwrap();
            assert_eq!(rec.sequence_no, seq);
        }
    }

    #[tokio::test]
    async fn test_drop_oldest_keeps_newest_and_counts() {
        let (writer, mut reader) = ingest_queue(SourceKind::Screen, 4, OverflowPolicy::DropOldest);
        let handle = writer.handle();
        for seq in 0..10 {
            writer.push(record(seq));
        }
        assert_eq!(handle.stats().produced(), 10);
        assert_eq!(handle.stats().dropped(), 6);

        let mut received = Vec::new();
        writer.close();
        while let Some(rec) = reader.recv().await {
            received.push(rec.sequence_no);
        }
        // Newest survive, order preserved, accounting balances.
        assert_eq!(received, vec![6, 7, 8, 9]);
        assert_eq!(
            received.len() as u64 + handle.stats().dropped(),
            handle.stats().produced()
        );
    }

    #[tokio::test]
    async fn test_block_with_timeout_discards_and_counts() {
        let (writer, mut reader) = ingest_queue(
            SourceKind::Microphone,
            1,
            OverflowPolicy::BlockWithTimeout(Duration::from_millis(20)),
        );
        let handle = writer.handle();
        assert!(writer.push(record(0)));
        // No reader draining: the second push waits out the timeout, then
        // the incoming record is discarded but counted.
        assert!(writer.push(record(1)));
        assert_eq!(handle.stats().produced(), 2);
        assert_eq!(handle.stats().dropped(), 1);

        writer.close();
        assert_eq!(reader.recv().await.unwrap().sequence_no, 0);
        assert!(reader.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_blocked_push_resumes_when_drained() {
        let (writer, mut reader) = ingest_queue(
            SourceKind::SystemAudio,
            1,
            OverflowPolicy::BlockWithTimeout(Duration::from_secs(5)),
        );
        let handle = writer.handle();
        let producer = std::thread::spawn(move || {
            writer.push(record(0));
            writer.push(record(1));
        });

        assert_eq!(reader.recv().await.unwrap().sequence_no, 0);
        assert_eq!(reader.recv().await.unwrap().sequence_no, 1);
        producer.join().unwrap();
        assert_eq!(handle.stats().dropped(), 0);
    }

    #[tokio::test]
    async fn test_recv_ends_after_close_and_drain() {
        let (writer, mut reader) = ingest_queue(SourceKind::Bluetooth, 8, OverflowPolicy::DropOldest);
        writer.push(record(0));
        drop(writer);
        assert!(reader.recv().await.is_some());
        assert!(reader.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_recv_wakes_on_enqueue() {
        let (writer, mut reader) = ingest_queue(SourceKind::Bluetooth, 8, OverflowPolicy::DropOldest);
        let pusher = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            writer.push(record(7));
        });
        let rec = reader.recv().await.unwrap();
        assert_eq!(rec.sequence_no, 7);
        pusher.join().unwrap();
    }

    #[tokio::test]
    async fn test_push_after_close_is_rejected() {
        let (writer, _reader) = ingest_queue(SourceKind::Bluetooth, 8, OverflowPolicy::DropOldest);
        let handle = writer.handle();
        writer.close();
        assert!(!writer.push(record(0)));
        assert_eq!(handle.stats().produced(), 0);
    }
}
