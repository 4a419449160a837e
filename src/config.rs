//! Recording configuration
//!
//! Recognized options for a session, plus the engine knobs (queue sizing,
//! overflow policies, timeouts, reorder window) that the synchronization
//! core deliberately exposes instead of hiding as constants.

use crate::queue::OverflowPolicy;
use crate::record::SourceKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Video quality levels, mapped to encoder CRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    /// CRF value for H.264/VP9 encoding. Lower = higher quality.
    pub fn crf(&self) -> u8 {
        match self {
            Quality::Low => 28,
            Quality::Medium => 23,
            Quality::High => 18,
        }
    }

    /// FFmpeg preset for H.264 encoding.
    pub fn h264_preset(&self) -> &'static str {
        match self {
            Quality::Low => "faster",
            Quality::Medium => "medium",
            Quality::High => "slow",
        }
    }
}

/// Container format for the video + system-audio pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Mp4,
    Webm,
}

impl ContainerFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Webm => "webm",
        }
    }

    pub fn video_codec(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "libx264",
            ContainerFormat::Webm => "libvpx-vp9",
        }
    }
}

/// Bluetooth monitoring options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BluetoothConfig {
    pub enabled: bool,
    /// Seconds between scan polls.
    pub scan_interval_secs: f64,
    /// Only report these device names; empty means all devices.
    pub target_devices: HashSet<String>,
    /// Replace device names with salted stable pseudonyms.
    pub anonymize: bool,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: 1.0,
            target_devices: HashSet::new(),
            anonymize: true,
        }
    }
}

impl BluetoothConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs_f64(self.scan_interval_secs.max(0.05))
    }
}

/// Output location and container choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub format: ContainerFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("Recordings"),
            format: ContainerFormat::Mp4,
        }
    }
}

/// Configuration for starting a recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingConfig {
    /// Frames per second for the screen stream.
    pub fps: u32,

    /// Encoder quality level.
    pub quality: Quality,

    /// Whether the cursor is part of the captured frames.
    pub include_cursor: bool,

    /// Whether to capture the screen.
    pub screen: bool,

    /// Whether to capture system audio.
    pub system_audio: bool,

    /// Whether to capture the microphone.
    pub microphone: bool,

    /// Audio sample rate in Hz.
    pub sample_rate: u32,

    pub bluetooth: BluetoothConfig,

    pub output: OutputConfig,

    /// Hold a system stay-awake lock for the duration of the session.
    pub prevent_sleep: bool,

    /// Streams whose failure is session-fatal; all others degrade.
    pub required_streams: HashSet<SourceKind>,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let mut required_streams = HashSet::new();
        required_streams.insert(SourceKind::Screen);
        Self {
            fps: 30,
            quality: Quality::High,
            include_cursor: true,
            screen: true,
            system_audio: true,
            microphone: true,
            sample_rate: 44_100,
            bluetooth: BluetoothConfig::default(),
            output: OutputConfig::default(),
            prevent_sleep: true,
            required_streams,
            engine: EngineConfig::default(),
        }
    }
}

impl RecordingConfig {
    pub fn is_required(&self, kind: SourceKind) -> bool {
        self.required_streams.contains(&kind)
    }

    /// Whether the given stream is requested for this session.
    pub fn stream_enabled(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Screen => self.screen,
            SourceKind::SystemAudio => self.system_audio,
            SourceKind::Microphone => self.microphone,
            SourceKind::Bluetooth => self.bluetooth.enabled,
        }
    }
}

/// Knobs of the synchronization core itself. All timeouts are explicit
/// configuration rather than hidden constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Queue capacity for the screen stream (drop-oldest).
    pub screen_queue_capacity: usize,
    /// Queue capacity for audio streams (block-with-timeout).
    pub audio_queue_capacity: usize,
    /// Queue capacity for discrete event streams (block-with-timeout).
    pub event_queue_capacity: usize,
    /// How long a loss-intolerant producer may block on a full queue.
    pub block_timeout_ms: u64,
    /// Max lateness tolerated when sorting event lines by capture time.
    pub reorder_window_ms: u64,
    /// Starting -> Recording deadline.
    pub startup_timeout_ms: u64,
    /// Grace period for an adapter to stop before its queue is force-closed.
    pub stop_grace_ms: u64,
    /// Queue drain deadline during Stopping.
    pub flush_timeout_ms: u64,
    /// Per-sink close/finalize deadline; exceeding it fails the session.
    pub sink_close_timeout_ms: u64,
    /// Adapter health poll period while Recording.
    pub health_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            screen_queue_capacity: 64,
            audio_queue_capacity: 256,
            event_queue_capacity: 256,
            block_timeout_ms: 250,
            reorder_window_ms: 500,
            startup_timeout_ms: 5_000,
            stop_grace_ms: 2_000,
            flush_timeout_ms: 10_000,
            sink_close_timeout_ms: 10_000,
            health_poll_ms: 200,
        }
    }
}

impl EngineConfig {
    pub fn queue_capacity(&self, kind: SourceKind) -> usize {
        match kind {
            SourceKind::Screen => self.screen_queue_capacity,
            SourceKind::SystemAudio | SourceKind::Microphone => self.audio_queue_capacity,
            SourceKind::Bluetooth => self.event_queue_capacity,
        }
    }

    pub fn overflow_policy(&self, kind: SourceKind) -> OverflowPolicy {
        match kind {
            SourceKind::Screen => OverflowPolicy::DropOldest,
            SourceKind::SystemAudio | SourceKind::Microphone | SourceKind::Bluetooth => {
                OverflowPolicy::BlockWithTimeout(Duration::from_millis(self.block_timeout_ms))
            }
        }
    }

    pub fn reorder_window(&self) -> Duration {
        Duration::from_millis(self.reorder_window_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn sink_close_timeout(&self) -> Duration {
        Duration::from_millis(self.sink_close_timeout_ms)
    }

    pub fn health_poll(&self) -> Duration {
        Duration::from_millis(self.health_poll_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_recognized_options() {
        let config = RecordingConfig::default();
        assert_eq!(config.fps, 30);
        assert_eq!(config.sample_rate, 44_100);
        assert!(config.bluetooth.enabled);
        assert!((config.bluetooth.scan_interval_secs - 1.0).abs() < f64::EPSILON);
        assert!(config.is_required(SourceKind::Screen));
        assert!(!config.is_required(SourceKind::Microphone));
    }

    #[test]
    fn test_policy_per_kind() {
        let engine = EngineConfig::default();
        assert_eq!(
            engine.overflow_policy(SourceKind::Screen),
            OverflowPolicy::DropOldest
        );
        assert!(matches!(
            engine.overflow_policy(SourceKind::Microphone),
            OverflowPolicy::BlockWithTimeout(_)
        ));
    }

    #[test]
    fn test_quality_crf_mapping() {
        assert_eq!(Quality::Low.crf(), 28);
        assert_eq!(Quality::Medium.crf(), 23);
        assert_eq!(Quality::High.crf(), 18);
    }

    #[test]
    fn test_scan_interval_has_floor() {
        let mut bt = BluetoothConfig::default();
        bt.scan_interval_secs = 0.0;
        assert!(bt.scan_interval() >= Duration::from_millis(50));
    }
}
