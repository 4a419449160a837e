//! FFmpeg-backed container sink
//!
//! Streams raw RGBA frames into an ffmpeg child process while staging
//! system-audio blocks to a WAV sidecar, then muxes the pair into the final
//! container on finalize. The streaming encode uses a fragmented layout so
//! a session that dies mid-write still leaves a readable file.

use super::{ContainerOptions, ContainerSink};
use crate::config::ContainerFormat;
use crate::error::SinkError;
use crate::record::{AudioBlock, VideoFrame};
use crate::utils::fs::secure_file;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

impl ContainerFormat {
    fn audio_codec(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "aac",
            ContainerFormat::Webm => "libopus",
        }
    }
}

struct FrameEncoder {
    process: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
}

impl Drop for FrameEncoder {
    fn drop(&mut self) {
        let _ = self.process.kill();
    }
}

pub struct FfmpegContainerSink {
    path: PathBuf,
    options: ContainerOptions,
    video_tmp: PathBuf,
    audio_tmp: PathBuf,
    encoder: Option<FrameEncoder>,
    audio: Option<hound::WavWriter<BufWriter<File>>>,
    frames: u64,
    audio_frames: u64,
    finalized: bool,
}

impl FfmpegContainerSink {
    /// Prepare a sink targeting `path`. The encoder process starts lazily on
    /// the first frame, once its dimensions are known.
    pub fn open(path: &Path, options: ContainerOptions) -> Result<Self, SinkError> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "capture".to_string());
        let parent = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        let ext = options.format.extension();
        Ok(Self {
            path: path.to_path_buf(),
            video_tmp: parent.join(format!("{}.video.{}", stem, ext)),
            audio_tmp: parent.join(format!("{}.sysaudio.wav", stem)),
            options,
            encoder: None,
            audio: None,
            frames: 0,
            audio_frames: 0,
            finalized: false,
        })
    }

    fn spawn_encoder(&self, width: u32, height: u32) -> Result<FrameEncoder, SinkError> {
        let args = encode_args(&self.options, width, height, &self.video_tmp);
        tracing::info!("Starting FFmpeg encoder: {:?}", args);

        let mut process = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SinkError::Encoder(format!("failed to start FFmpeg encoder: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| SinkError::Encoder("failed to capture FFmpeg stdin".to_string()))?;

        Ok(FrameEncoder {
            process,
            stdin: Some(stdin),
            width,
            height,
        })
    }

    fn finish_encoder(&mut self) -> Result<bool, SinkError> {
        let Some(mut encoder) = self.encoder.take() else {
            return Ok(false);
        };
        // Closing stdin signals EOF to FFmpeg.
        drop(encoder.stdin.take());
        let status = encoder
            .process
            .wait()
            .map_err(|e| SinkError::Encoder(format!("failed to wait for FFmpeg: {}", e)))?;
        if !status.success() {
            return Err(SinkError::Encoder(format!(
                "FFmpeg encoder exited with {}",
                status
            )));
        }
        tracing::info!("FFmpeg encoder finished: {} frames written", self.frames);
        Ok(true)
    }

    fn finish_audio(&mut self) -> Result<bool, SinkError> {
        let Some(writer) = self.audio.take() else {
            return Ok(false);
        };
        writer
            .finalize()
            .map_err(|e| SinkError::Encoder(format!("audio staging finalize failed: {}", e)))?;
        Ok(true)
    }

    fn run_mux(&self, args: Vec<String>) -> Result<(), SinkError> {
        tracing::info!("Finalizing container: {:?}", args);
        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| SinkError::Encoder(format!("failed to run FFmpeg mux: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SinkError::Encoder(format!("FFmpeg mux failed: {}", stderr)));
        }
        Ok(())
    }
}

impl ContainerSink for FfmpegContainerSink {
    fn write_frame(&mut self, frame: &VideoFrame, _capture_time_ns: i64) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::Finalized);
        }
        if self.encoder.is_none() {
            self.encoder = Some(self.spawn_encoder(frame.width, frame.height)?);
        }
        let encoder = self.encoder.as_mut().ok_or(SinkError::Finalized)?;
        if frame.width != encoder.width || frame.height != encoder.height {
            return Err(SinkError::Encoder(format!(
                "frame size changed mid-stream: {}x{} -> {}x{}",
                encoder.width, encoder.height, frame.width, frame.height
            )));
        }
        let stdin = encoder
            .stdin
            .as_mut()
            .ok_or_else(|| SinkError::Encoder("encoder stdin closed".to_string()))?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| SinkError::Encoder(format!("failed to write frame: {}", e)))?;
        self.frames += 1;
        Ok(())
    }

    fn write_audio(&mut self, block: &AudioBlock, _capture_time_ns: i64) -> Result<(), SinkError> {
        if self.finalized {
            return Err(SinkError::Finalized);
        }
        if self.audio.is_none() {
            let spec = hound::WavSpec {
                channels: block.channels,
                sample_rate: block.sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            };
            let writer = hound::WavWriter::create(&self.audio_tmp, spec).map_err(|e| {
                SinkError::Encoder(format!("failed to create audio staging file: {}", e))
            })?;
            self.audio = Some(writer);
        }
        let writer = self.audio.as_mut().ok_or(SinkError::Finalized)?;
        for &sample in block.samples.iter() {
            writer
                .write_sample(super::wav::to_pcm16(sample))
                .map_err(|e| SinkError::Encoder(format!("audio staging write failed: {}", e)))?;
        }
        self.audio_frames += block.frame_count() as u64;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;

        let has_video = self.finish_encoder()?;
        let has_audio = self.finish_audio()?;

        match (has_video, has_audio) {
            (true, true) => {
                self.run_mux(remux_args(
                    &self.options,
                    &self.video_tmp,
                    Some(&self.audio_tmp),
                    &self.path,
                ))?;
                let _ = std::fs::remove_file(&self.video_tmp);
                let _ = std::fs::remove_file(&self.audio_tmp);
            }
            (true, false) => {
                self.run_mux(remux_args(&self.options, &self.video_tmp, None, &self.path))?;
                let _ = std::fs::remove_file(&self.video_tmp);
            }
            (false, true) => {
                // Audio-only session: the container carries the system-audio
                // track alone.
                let args = vec![
                    "-y".to_string(),
                    "-i".to_string(),
                    self.audio_tmp.to_string_lossy().to_string(),
                    "-c:a".to_string(),
                    self.options.format.audio_codec().to_string(),
                    "-b:a".to_string(),
                    "192k".to_string(),
                    self.path.to_string_lossy().to_string(),
                ];
                self.run_mux(args)?;
                let _ = std::fs::remove_file(&self.audio_tmp);
            }
            (false, false) => {
                tracing::warn!("container sink finalized without any records");
                return Ok(());
            }
        }

        secure_file(&self.path);
        tracing::info!(
            "Container finalized: {} frames, {} audio frames -> {:?}",
            self.frames,
            self.audio_frames,
            self.path
        );
        Ok(())
    }
}

/// Arguments for the streaming raw-RGBA encode. The fragmented layout keeps
/// the intermediate readable even if the process dies mid-write.
fn encode_args(options: &ContainerOptions, width: u32, height: u32, out: &Path) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgba".to_string(),
        "-s".to_string(),
        format!("{}x{}", width, height),
        "-r".to_string(),
        options.fps.to_string(),
        "-i".to_string(),
        "-".to_string(),
        "-c:v".to_string(),
        options.format.video_codec().to_string(),
        "-crf".to_string(),
        options.quality.crf().to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ];
    match options.format {
        ContainerFormat::Mp4 => {
            args.extend([
                "-preset".to_string(),
                options.quality.h264_preset().to_string(),
                "-movflags".to_string(),
                "frag_keyframe+empty_moov".to_string(),
            ]);
        }
        ContainerFormat::Webm => {
            args.extend(["-b:v".to_string(), "0".to_string()]);
        }
    }
    args.push(out.to_string_lossy().to_string());
    args
}

/// Arguments for the finalize pass: copy the video track, encode audio if
/// present, and rewrite the layout for playback.
fn remux_args(
    options: &ContainerOptions,
    video: &Path,
    audio: Option<&Path>,
    out: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
    ];
    if let Some(audio) = audio {
        args.extend(["-i".to_string(), audio.to_string_lossy().to_string()]);
    }
    args.extend(["-c:v".to_string(), "copy".to_string()]);
    if audio.is_some() {
        args.extend([
            "-c:a".to_string(),
            options.format.audio_codec().to_string(),
            "-b:a".to_string(),
            "192k".to_string(),
        ]);
    }
    if options.format == ContainerFormat::Mp4 {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    args.push(out.to_string_lossy().to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Quality;

    fn options() -> ContainerOptions {
        ContainerOptions {
            fps: 30,
            quality: Quality::High,
            format: ContainerFormat::Mp4,
        }
    }

    #[test]
    fn test_encode_args_shape() {
        let args = encode_args(&options(), 1280, 720, Path::new("out.video.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-s 1280x720"));
        assert!(joined.contains("-r 30"));
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("frag_keyframe+empty_moov"));
        assert_eq!(args.last().unwrap(), "out.video.mp4");
    }

    #[test]
    fn test_remux_args_with_audio() {
        let args = remux_args(
            &options(),
            Path::new("a.video.mp4"),
            Some(Path::new("a.sysaudio.wav")),
            Path::new("a.mp4"),
        );
        let joined = args.join(" ");
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("+faststart"));
    }

    #[test]
    fn test_remux_args_video_only() {
        let args = remux_args(&options(), Path::new("a.video.mp4"), None, Path::new("a.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-c:v copy"));
        assert!(!joined.contains("-c:a"));
    }

    #[test]
    fn test_webm_uses_opus() {
        let mut opts = options();
        opts.format = ContainerFormat::Webm;
        let args = remux_args(
            &opts,
            Path::new("a.video.webm"),
            Some(Path::new("a.sysaudio.wav")),
            Path::new("a.webm"),
        );
        assert!(args.join(" ").contains("-c:a libopus"));
    }

    #[test]
    fn test_sidecar_paths_derive_from_target() {
        let sink = FfmpegContainerSink::open(Path::new("/tmp/rec/capture.mp4"), options()).unwrap();
        assert_eq!(sink.video_tmp, Path::new("/tmp/rec/capture.video.mp4"));
        assert_eq!(sink.audio_tmp, Path::new("/tmp/rec/capture.sysaudio.wav"));
    }
}
