//! JSON-Lines event sink
//!
//! One JSON object per line: `{"ts": <i64 ns>, "type": <string>, ...}`.
//! `ts` is always the anchor-relative capture time, so event lines correlate
//! exactly with the other artifacts. Lines are flushed as they are written;
//! an abrupt end loses at most the line in flight.

use super::EventSink;
use crate::error::SinkError;
use crate::record::EventRecord;
use crate::utils::fs::secure_file;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct JsonlEventSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines: u64,
}

impl JsonlEventSink {
    pub fn open(path: &std::path::Path) -> Result<Self, SinkError> {
        let file = File::create(path)?;
        secure_file(path);
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
            lines: 0,
        })
    }

    pub fn lines_written(&self) -> u64 {
        self.lines
    }
}

impl EventSink for JsonlEventSink {
    fn write_event(&mut self, capture_time_ns: i64, event: &EventRecord) -> Result<(), SinkError> {
        let writer = self.writer.as_mut().ok_or(SinkError::Finalized)?;

        let mut line = serde_json::Map::with_capacity(event.fields.len() + 2);
        line.insert("ts".into(), serde_json::Value::from(capture_time_ns));
        line.insert(
            "type".into(),
            serde_json::Value::from(event.event_type.clone()),
        );
        for (key, value) in &event.fields {
            line.insert(key.clone(), value.clone());
        }

        serde_json::to_writer(&mut *writer, &serde_json::Value::Object(line))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        self.lines += 1;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), SinkError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            secure_file(&self.path);
            tracing::info!("Event log finalized: {} lines", self.lines);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_carry_ts_and_type() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");
        let mut sink = JsonlEventSink::open(&path).unwrap();

        sink.write_event(1_000_000_000, &EventRecord::bluetooth("AirPods Pro", -45))
            .unwrap();
        sink.write_event(2_000_000_000, &EventRecord::bluetooth("AirPods Pro", -47))
            .unwrap();
        sink.finalize().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["ts"], 1_000_000_000i64);
        assert_eq!(lines[0]["type"], "bluetooth");
        assert_eq!(lines[0]["device"], "AirPods Pro");
        assert_eq!(lines[1]["rssi"], -47);
    }

    #[test]
    fn test_write_after_finalize_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");
        let mut sink = JsonlEventSink::open(&path).unwrap();
        sink.finalize().unwrap();

        let err = sink
            .write_event(0, &EventRecord::bluetooth("dev", -1))
            .unwrap_err();
        assert!(matches!(err, SinkError::Finalized));
    }

    #[test]
    fn test_finalize_twice_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("events.jsonl");
        let mut sink = JsonlEventSink::open(&path).unwrap();
        sink.finalize().unwrap();
        sink.finalize().unwrap();
    }
}
