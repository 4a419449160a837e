//! sessioncap command line
//!
//! Drives a recording session from the terminal. The OS capture layers are
//! external to this crate, so the binary records the built-in synthetic
//! producers: a generated test pattern, a sine tone on both audio streams,
//! and a simulated Bluetooth neighborhood. Ctrl+C (or `--duration`) stops
//! and finalizes the session.

use clap::Parser;
use sessioncap::config::RecordingConfig;
use sessioncap::session::{SessionCoordinator, SessionEvent};
use sessioncap::source::synthetic::{
    SyntheticAudioProducer, SyntheticBluetoothScanner, SyntheticFrameProducer,
};
use sessioncap::source::{AudioSourceAdapter, BluetoothAdapter, ScreenAdapter};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sessioncap", version, about = "Record a desktop session with every stream on one clock")]
struct Args {
    /// Name for the session directory
    output_name: String,

    /// Frames per second for the screen stream
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Disable screen recording
    #[arg(long)]
    no_screen: bool,

    /// Disable system audio recording
    #[arg(long)]
    no_audio: bool,

    /// Disable microphone recording
    #[arg(long)]
    no_mic: bool,

    /// Disable Bluetooth monitoring
    #[arg(long)]
    no_bluetooth: bool,

    /// Disable Bluetooth device-name anonymization
    #[arg(long)]
    no_anonymize: bool,

    /// Output directory
    #[arg(long, default_value = "Recordings")]
    output_dir: PathBuf,

    /// Stop automatically after this many seconds
    #[arg(long)]
    duration: Option<u64>,
}

impl Args {
    fn into_config(self) -> (String, Option<u64>, RecordingConfig) {
        let mut config = RecordingConfig::default();
        config.fps = self.fps;
        config.screen = !self.no_screen;
        config.system_audio = !self.no_audio;
        config.microphone = !self.no_mic;
        config.bluetooth.enabled = !self.no_bluetooth;
        config.bluetooth.anonymize = !self.no_anonymize;
        config.output.directory = self.output_dir;
        (self.output_name, self.duration, config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessioncap=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting sessioncap v{}", env!("CARGO_PKG_VERSION"));

    let (name, duration, config) = Args::parse().into_config();

    let coordinator = SessionCoordinator::with_defaults();
    coordinator
        .add_source(Box::new(ScreenAdapter::new(Box::new(
            SyntheticFrameProducer::new(1280, 720, config.fps),
        ))))
        .await;
    coordinator
        .add_source(Box::new(AudioSourceAdapter::system_audio(Box::new(
            SyntheticAudioProducer::new(config.sample_rate, 2),
        ))))
        .await;
    coordinator
        .add_source(Box::new(AudioSourceAdapter::microphone(Box::new(
            SyntheticAudioProducer::new(config.sample_rate, 1),
        ))))
        .await;
    coordinator
        .add_source(Box::new(BluetoothAdapter::new(
            Box::new(SyntheticBluetoothScanner::new(vec![
                ("AirPods Pro".into(), -45),
                ("MX Master 3".into(), -60),
            ])),
            config.bluetooth.clone(),
        )))
        .await;

    let mut events = coordinator.subscribe();
    coordinator.start(&name, config).await?;
    println!("Recording... press Ctrl+C to stop");

    let started = std::time::Instant::now();
    let mut ticks = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Failed { reason }) => {
                    eprintln!("\nSession failed: {}", reason);
                    break;
                }
                Ok(SessionEvent::Degraded { kind, reason }) => {
                    eprintln!("\n{} stream degraded: {}", kind, reason);
                }
                Ok(_) => {}
                Err(_) => {}
            },
            _ = ticks.tick() => {
                let elapsed = started.elapsed().as_secs();
                if duration.is_some_and(|limit| elapsed >= limit) {
                    println!("\nDuration reached, stopping...");
                    break;
                }
                print!("\r  Duration: {:02}:{:02}", elapsed / 60, elapsed % 60);
                let _ = std::io::stdout().flush();
            }
        }
    }

    let report = coordinator.stop().await?;
    println!("Session {:?}", report.outcome);
    if let Some(dir) = &report.session_dir {
        println!("Saved to: {}", dir.display());
    }
    for artifact in &report.artifacts {
        println!("  {}", artifact.display());
    }
    for degradation in &report.degradations {
        println!("  missing {}: {}", degradation.kind, degradation.reason);
    }
    for (kind, dropped) in &report.records_dropped {
        if *dropped > 0 {
            println!("  {} dropped {} record(s) under backpressure", kind, dropped);
        }
    }
    Ok(())
}
