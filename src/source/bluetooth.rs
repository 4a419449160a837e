//! Bluetooth source adapter
//!
//! Unlike the push-driven capture sources, the scanner is polled at a fixed
//! cadence. The adapter runs the polling loop, filters and optionally
//! anonymizes device names, and hides the cadence difference behind the
//! common `SourceAdapter` interface.

use super::producer::BluetoothScanner;
use super::{AdapterShared, SourceAdapter, SourceStatus, Timestamper};
use crate::clock::ClockAnchor;
use crate::config::BluetoothConfig;
use crate::error::AttachError;
use crate::queue::{QueueHandle, QueueWriter};
use crate::record::{EventRecord, RecordPayload, SourceKind, TimestampedRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Replaces device names with salted stable pseudonyms so signal-strength
/// traces don't leak which devices were nearby. Stable within a session,
/// unlinkable across sessions.
pub struct DeviceAnonymizer {
    salt: String,
    known: HashMap<String, String>,
}

impl DeviceAnonymizer {
    pub fn new() -> Self {
        Self::with_salt(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn with_salt(salt: String) -> Self {
        Self {
            salt,
            known: HashMap::new(),
        }
    }

    pub fn anonymize(&mut self, device_name: &str) -> String {
        if device_name.is_empty() {
            return "Unknown".to_string();
        }
        if let Some(mapped) = self.known.get(device_name) {
            return mapped.clone();
        }
        let digest = blake3::hash(format!("{}{}", self.salt, device_name).as_bytes());
        let mapped = format!("Device_{}", &hex::encode(&digest.as_bytes()[..3]));
        self.known.insert(device_name.to_string(), mapped.clone());
        mapped
    }
}

impl Default for DeviceAnonymizer {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BluetoothAdapter {
    config: BluetoothConfig,
    scanner: Option<Box<dyn BluetoothScanner>>,
    shared: Arc<AdapterShared>,
    queue: Option<QueueHandle>,
    stop_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl BluetoothAdapter {
    pub fn new(scanner: Box<dyn BluetoothScanner>, config: BluetoothConfig) -> Self {
        Self {
            config,
            scanner: Some(scanner),
            shared: AdapterShared::new(SourceKind::Bluetooth),
            queue: None,
            stop_tx: None,
            task: None,
        }
    }
}

#[async_trait]
impl SourceAdapter for BluetoothAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Bluetooth
    }

    async fn start(&mut self, anchor: ClockAnchor, writer: QueueWriter) -> Result<(), AttachError> {
        self.shared.reset();
        let mut scanner = self
            .scanner
            .take()
            .ok_or_else(|| AttachError::new("bluetooth scanner already running"))?;

        if let Err(e) = scanner.attach() {
            self.scanner = Some(scanner);
            return Err(e);
        }

        self.queue = Some(writer.handle());
        self.shared.set_attached(true);

        let (stop_tx, mut stop_rx) = watch::channel(false);
        self.stop_tx = Some(stop_tx);

        let shared = self.shared.clone();
        let config = self.config.clone();
        let mut stamper = Timestamper::new(anchor, shared.clone());
        let mut anonymizer = config.anonymize.then(DeviceAnonymizer::new);
        let scan_interval = config.scan_interval();

        self.task = Some(tokio::spawn(async move {
            let mut ticks = tokio::time::interval(scan_interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; scanning starts on the first
            // full interval, matching the scanner's own discovery window.
            ticks.tick().await;

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticks.tick() => {
                        let readings = match scanner.poll() {
                            Ok(readings) => readings,
                            Err(reason) => {
                                shared.fail(reason);
                                break;
                            }
                        };
                        for reading in readings {
                            if !config.target_devices.is_empty()
                                && !config.target_devices.contains(&reading.device)
                            {
                                continue;
                            }
                            let device = match anonymizer.as_mut() {
                                Some(anonymizer) => anonymizer.anonymize(&reading.device),
                                None => reading.device,
                            };
                            let (capture_time_ns, sequence_no) =
                                stamper.stamp(reading.native_ts_ns);
                            writer.push(TimestampedRecord {
                                source_kind: SourceKind::Bluetooth,
                                capture_time_ns,
                                sequence_no,
                                payload: RecordPayload::Event(EventRecord::bluetooth(
                                    device,
                                    reading.rssi,
                                )),
                            });
                        }
                    }
                }
            }
            scanner.detach();
            // Writer drops here, closing the queue for the drain.
        }));

        tracing::info!(
            "bluetooth adapter attached (interval {:?})",
            scan_interval
        );
        Ok(())
    }

    async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        self.shared.set_attached(false);
        if let Some(queue) = self.queue.take() {
            queue.close();
        }
        tracing::info!("bluetooth adapter detached");
    }

    fn status(&self) -> SourceStatus {
        self.shared.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymizer_is_stable_within_session() {
        let mut anonymizer = DeviceAnonymizer::with_salt("test-salt".into());
        let a = anonymizer.anonymize("AirPods Pro");
        let b = anonymizer.anonymize("AirPods Pro");
        assert_eq!(a, b);
    }

    #[test]
    fn test_anonymizer_separates_devices() {
        let mut anonymizer = DeviceAnonymizer::with_salt("test-salt".into());
        assert_ne!(
            anonymizer.anonymize("AirPods Pro"),
            anonymizer.anonymize("iPhone 15")
        );
    }

    #[test]
    fn test_anonymizer_format() {
        let mut anonymizer = DeviceAnonymizer::with_salt("test-salt".into());
        let name = anonymizer.anonymize("MyDevice");
        assert!(name.starts_with("Device_"));
        assert_eq!(name.len(), "Device_".len() + 6);
    }

    #[test]
    fn test_empty_name_is_unknown() {
        let mut anonymizer = DeviceAnonymizer::with_salt("test-salt".into());
        assert_eq!(anonymizer.anonymize(""), "Unknown");
    }

    #[test]
    fn test_salts_unlink_sessions() {
        let mut first = DeviceAnonymizer::with_salt("session-a".into());
        let mut second = DeviceAnonymizer::with_salt("session-b".into());
        assert_ne!(
            first.anonymize("AirPods Pro"),
            second.anonymize("AirPods Pro")
        );
    }
}
