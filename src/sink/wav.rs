//! WAV audio-file sink
//!
//! Streams interleaved sample blocks straight to disk as 16-bit PCM, so
//! memory stays flat however long the session runs.

use super::AudioFileSink;
use crate::error::SinkError;
use crate::record::AudioBlock;
use crate::utils::fs::secure_file;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub struct HoundWavSink {
    path: PathBuf,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    frames: u64,
}

impl HoundWavSink {
    pub fn open(path: &Path, sample_rate: u32, channels: u16) -> Result<Self, SinkError> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)
            .map_err(|e| SinkError::Encoder(format!("failed to create WAV writer: {}", e)))?;
        secure_file(path);
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            frames: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }
}

/// Convert a float sample to PCM16 with clipping.
pub(crate) fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

impl AudioFileSink for HoundWavSink {
    fn write_block(&mut self, block: &AudioBlock, _capture_time_ns: i64) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Finalized)?;
        for &sample in block.samples.iter() {
            writer
                .write_sample(to_pcm16(sample))
                .map_err(|e| SinkError::Encoder(format!("WAV write failed: {}", e)))?;
        }
        self.frames += block.frame_count() as u64;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| SinkError::Encoder(format!("WAV finalize failed: {}", e)))?;
            secure_file(&self.path);
            tracing::info!("WAV finalized: {} frames -> {:?}", self.frames, self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn block(samples: Vec<f32>, channels: u16) -> AudioBlock {
        AudioBlock {
            samples: Arc::new(samples),
            channels,
            sample_rate: 44_100,
        }
    }

    #[test]
    fn test_round_trip_sample_count() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mic.wav");
        let mut sink = HoundWavSink::open(&path, 44_100, 2).unwrap();

        sink.write_block(&block(vec![0.0; 882], 2), 0).unwrap();
        sink.write_block(&block(vec![0.5; 882], 2), 10_000_000).unwrap();
        assert_eq!(sink.frames_written(), 882);
        sink.finalize().unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 44_100);
        assert_eq!(reader.len(), 1_764);
    }

    #[test]
    fn test_clipping_beyond_full_scale() {
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
        assert_eq!(to_pcm16(0.0), 0);
    }

    #[test]
    fn test_write_after_finalize_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mic.wav");
        let mut sink = HoundWavSink::open(&path, 44_100, 1).unwrap();
        sink.finalize().unwrap();
        let err = sink.write_block(&block(vec![0.0; 4], 1), 0).unwrap_err();
        assert!(matches!(err, SinkError::Finalized));
    }
}
