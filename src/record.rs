//! The universal record envelope
//!
//! Every stream, whatever its native payload, flows through the pipeline as
//! a `TimestampedRecord`: a tagged payload stamped with an anchor-relative
//! capture time and a per-source sequence number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The four stream kinds a session can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceKind {
    Screen,
    SystemAudio,
    Microphone,
    Bluetooth,
}

impl SourceKind {
    /// Stable lowercase label, used in log lines and event records.
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Screen => "screen",
            SourceKind::SystemAudio => "system-audio",
            SourceKind::Microphone => "microphone",
            SourceKind::Bluetooth => "bluetooth",
        }
    }

    pub const ALL: [SourceKind; 4] = [
        SourceKind::Screen,
        SourceKind::SystemAudio,
        SourceKind::Microphone,
        SourceKind::Bluetooth,
    ];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A raw video frame handle (RGBA).
///
/// Frame bytes are shared, not copied, on the way through the queues.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
}

/// An interleaved block of audio samples.
#[derive(Debug, Clone)]
pub struct AudioBlock {
    pub samples: Arc<Vec<f32>>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBlock {
    /// Number of sample frames (samples per channel) in the block.
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }
}

/// A discrete structured event, written as one JSON object per line.
///
/// `event_type` becomes the line's `"type"` field; `fields` are flattened
/// alongside it.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub event_type: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl EventRecord {
    /// Build a bluetooth RSSI event.
    pub fn bluetooth(device: impl Into<String>, rssi: i16) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("device".into(), serde_json::Value::from(device.into()));
        fields.insert("rssi".into(), serde_json::Value::from(rssi));
        Self {
            event_type: "bluetooth".into(),
            fields,
        }
    }
}

/// Variant payload per source kind.
///
/// A sum type rather than a trait hierarchy: the four kinds never share
/// behavior beyond the envelope fields.
#[derive(Debug, Clone)]
pub enum RecordPayload {
    VideoFrame(VideoFrame),
    AudioBlock(AudioBlock),
    Event(EventRecord),
}

/// The unit flowing through the pipeline.
///
/// For a fixed `source_kind`, `sequence_no` is strictly increasing and
/// `capture_time_ns` is non-decreasing; a violation indicates a producer bug
/// and is reported by the adapter, never silently fixed.
#[derive(Debug, Clone)]
pub struct TimestampedRecord {
    pub source_kind: SourceKind,
    /// Nanoseconds since the session's clock anchor (not wall-clock epoch).
    pub capture_time_ns: i64,
    /// Monotonically increasing, unique per `source_kind`.
    pub sequence_no: u64,
    pub payload: RecordPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_labels() {
        assert_eq!(SourceKind::Screen.label(), "screen");
        assert_eq!(SourceKind::SystemAudio.label(), "system-audio");
        assert_eq!(format!("{}", SourceKind::Bluetooth), "bluetooth");
    }

    #[test]
    fn test_audio_block_frame_count() {
        let block = AudioBlock {
            samples: Arc::new(vec![0.0; 960]),
            channels: 2,
            sample_rate: 48_000,
        };
        assert_eq!(block.frame_count(), 480);
    }

    #[test]
    fn test_bluetooth_event_fields() {
        let event = EventRecord::bluetooth("AirPods Pro", -45);
        assert_eq!(event.event_type, "bluetooth");
        assert_eq!(event.fields["device"], "AirPods Pro");
        assert_eq!(event.fields["rssi"], -45);
    }
}
