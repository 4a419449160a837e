//! Synthetic capture producers
//!
//! Deterministic in-process producers implementing the external capture
//! contracts. They let the whole engine run end-to-end without any OS
//! capture layer: the demo binary records a generated test pattern, and the
//! lifecycle tests drive sessions with exact, repeatable streams.
//!
//! Native timestamps follow an ideal clock (tick index times period), which
//! is what a well-behaved device clock looks like to the engine.

use super::producer::{
    AudioProducer, BluetoothReading, BluetoothScanner, FrameProducer, Sample, SourceTap,
};
use crate::error::AttachError;
use crate::record::{AudioBlock, VideoFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Generates solid-shade RGBA frames at a fixed rate.
pub struct SyntheticFrameProducer {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Stop after this many frames (None = until detach).
    pub frame_limit: Option<u64>,
    /// Report a producer fault after this many frames.
    pub fail_after: Option<u64>,
    /// Pace delivery at the real frame period; tests turn this off.
    pub realtime: bool,
    /// When false, `attach` reports the producer unavailable.
    pub available: bool,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyntheticFrameProducer {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            frame_limit: None,
            fail_after: None,
            realtime: true,
            available: true,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl FrameProducer for SyntheticFrameProducer {
    fn attach(&mut self, mut tap: SourceTap<VideoFrame>) -> Result<(), AttachError> {
        if !self.available {
            return Err(AttachError::new("screen capture unavailable"));
        }
        self.stop.store(false, Ordering::SeqCst);
        let stop = self.stop.clone();
        let (width, height, fps) = (self.width, self.height, self.fps.max(1));
        let frame_limit = self.frame_limit;
        let fail_after = self.fail_after;
        let realtime = self.realtime;
        let period_ns = NANOS_PER_SEC / fps as i64;

        self.thread = Some(std::thread::spawn(move || {
            let mut index: u64 = 0;
            loop {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                if fail_after == Some(index) {
                    tap.fail("synthetic frame producer fault");
                    break;
                }
                if frame_limit == Some(index) {
                    break;
                }
                let shade = (index % 256) as u8;
                tap.push(Sample {
                    native_ts_ns: index as i64 * period_ns,
                    payload: VideoFrame {
                        data: Arc::new(vec![shade; (width * height * 4) as usize]),
                        width,
                        height,
                    },
                });
                index += 1;
                if realtime {
                    std::thread::sleep(Duration::from_nanos(period_ns as u64));
                } else {
                    std::thread::yield_now();
                }
            }
        }));
        Ok(())
    }

    fn detach(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Generates a 440 Hz sine at a fixed block size.
pub struct SyntheticAudioProducer {
    pub sample_rate: u32,
    pub channels: u16,
    pub block_frames: u32,
    pub block_limit: Option<u64>,
    pub fail_after: Option<u64>,
    pub realtime: bool,
    pub available: bool,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SyntheticAudioProducer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            block_frames: 1_024,
            block_limit: None,
            fail_after: None,
            realtime: true,
            available: true,
            stop: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

impl AudioProducer for SyntheticAudioProducer {
    fn attach(&mut self, mut tap: SourceTap<AudioBlock>) -> Result<(), AttachError> {
        if !self.available {
            return Err(AttachError::new("audio device unavailable"));
        }
        self.stop.store(false, Ordering::SeqCst);
        let stop = self.stop.clone();
        let (sample_rate, channels) = (self.sample_rate.max(1), self.channels.max(1));
        let block_frames = self.block_frames.max(1) as u64;
        let block_limit = self.block_limit;
        let fail_after = self.fail_after;
        let realtime = self.realtime;
        let block_period_ns = block_frames as i64 * NANOS_PER_SEC / sample_rate as i64;

        self.thread = Some(std::thread::spawn(move || {
            let mut index: u64 = 0;
            loop {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                if fail_after == Some(index) {
                    tap.fail("synthetic audio producer fault");
                    break;
                }
                if block_limit == Some(index) {
                    break;
                }
                let mut samples = Vec::with_capacity((block_frames * channels as u64) as usize);
                for frame in 0..block_frames {
                    let t = (index * block_frames + frame) as f32 / sample_rate as f32;
                    let value = (t * 440.0 * std::f32::consts::TAU).sin() * 0.2;
                    for _ in 0..channels {
                        samples.push(value);
                    }
                }
                tap.push(Sample {
                    native_ts_ns: index as i64 * block_period_ns,
                    payload: AudioBlock {
                        samples: Arc::new(samples),
                        channels,
                        sample_rate,
                    },
                });
                index += 1;
                if realtime {
                    std::thread::sleep(Duration::from_nanos(block_period_ns as u64));
                } else {
                    std::thread::yield_now();
                }
            }
        }));
        Ok(())
    }

    fn detach(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Reports a fixed set of devices once per poll, with the native clock
/// advancing one step per poll.
pub struct SyntheticBluetoothScanner {
    pub devices: Vec<(String, i16)>,
    /// Native-clock advance per poll; defaults to one second, mirroring a
    /// one-second discovery window.
    pub step_ns: i64,
    pub fail_after_polls: Option<u64>,
    pub available: bool,
    polls: u64,
}

impl SyntheticBluetoothScanner {
    pub fn new(devices: Vec<(String, i16)>) -> Self {
        Self {
            devices,
            step_ns: NANOS_PER_SEC,
            fail_after_polls: None,
            available: true,
            polls: 0,
        }
    }
}

impl BluetoothScanner for SyntheticBluetoothScanner {
    fn attach(&mut self) -> Result<(), AttachError> {
        if !self.available {
            return Err(AttachError::new("bluetooth scanner unavailable"));
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<Vec<BluetoothReading>, String> {
        if self.fail_after_polls == Some(self.polls) {
            return Err("synthetic scanner fault".to_string());
        }
        let native_ts_ns = self.polls as i64 * self.step_ns;
        self.polls += 1;
        Ok(self
            .devices
            .iter()
            .map(|(device, rssi)| BluetoothReading {
                native_ts_ns,
                device: device.clone(),
                rssi: *rssi,
            })
            .collect())
    }

    fn detach(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_frame_producer_respects_limit() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        let mut producer = SyntheticFrameProducer::new(4, 4, 30);
        producer.frame_limit = Some(5);
        producer.realtime = false;

        let tap = SourceTap::new(
            move |sample: Sample<VideoFrame>| sink.lock().push(sample.native_ts_ns),
            |_| {},
        );
        producer.attach(tap).unwrap();
        producer.detach();

        let frames = frames.lock();
        assert_eq!(frames.len(), 5);
        // Ideal native clock: exactly one period apart.
        assert_eq!(frames[1] - frames[0], NANOS_PER_SEC / 30);
    }

    #[test]
    fn test_audio_producer_faults_on_cue() {
        let failed = Arc::new(Mutex::new(None));
        let sink = failed.clone();
        let mut producer = SyntheticAudioProducer::new(44_100, 1);
        producer.fail_after = Some(2);
        producer.realtime = false;

        let tap = SourceTap::new(
            |_| {},
            move |reason: String| *sink.lock() = Some(reason),
        );
        producer.attach(tap).unwrap();
        producer.detach();

        assert!(failed.lock().as_deref().is_some());
    }

    #[test]
    fn test_scanner_steps_native_clock_per_poll() {
        let mut scanner = SyntheticBluetoothScanner::new(vec![("A".into(), -40)]);
        scanner.attach().unwrap();
        let first = scanner.poll().unwrap();
        let second = scanner.poll().unwrap();
        assert_eq!(second[0].native_ts_ns - first[0].native_ts_ns, NANOS_PER_SEC);
    }

    #[test]
    fn test_unavailable_scanner_refuses_attach() {
        let mut scanner = SyntheticBluetoothScanner::new(vec![]);
        scanner.available = false;
        assert!(scanner.attach().is_err());
    }
}
