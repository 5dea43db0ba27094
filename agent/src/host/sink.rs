//! Logging sinks
//!
//! `TracingSink` writes through the process-wide `tracing` subscriber,
//! `JsonLinesSink` hands lines to a background writer task through a bounded
//! channel and drops them when the channel is full.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use hookwatch_shared::utils::time::{format_timestamp, system_time_nanos};
use hookwatch_shared::EventRecord;
use serde_json::json;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::{EventSink, Severity};

/// Target used for event lines so they can be filtered apart from diagnostics
pub const EVENT_TARGET: &str = "hookwatch::events";

/// Sink that forwards every line to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn write(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => info!(target: EVENT_TARGET, "{}", message),
            Severity::Warning => warn!(target: EVENT_TARGET, "{}", message),
        }
    }

    fn write_record(&self, record: &EventRecord<'_>) {
        info!(
            target: EVENT_TARGET,
            category = %record.category,
            pid = record.caller.pid,
            "{}",
            record
        );
    }
}

/// Sink writing one JSON object per line to a file
pub struct JsonLinesSink {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl JsonLinesSink {
    /// Create the output file and start the writer task.
    ///
    /// The task finishes once every clone of the sink is dropped and returns
    /// the number of lines written.
    pub async fn spawn(path: &Path, capacity: usize) -> Result<(Self, JoinHandle<Result<u64>>)> {
        let file = tokio::fs::File::create(path)
            .await
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;

        let (tx, mut rx) = mpsc::channel::<String>(capacity.max(1));
        let shown = path.display().to_string();

        let handle = tokio::spawn(async move {
            let mut writer = BufWriter::new(file);
            let mut written = 0u64;
            while let Some(mut line) = rx.recv().await {
                line.push('\n');
                writer
                    .write_all(line.as_bytes())
                    .await
                    .with_context(|| format!("Failed to write to {}", shown))?;
                written += 1;
            }
            writer.flush().await?;
            info!("JSON event log written to {} ({} lines)", shown, written);
            Ok(written)
        });

        Ok((
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            handle,
        ))
    }

    /// Lines lost because the writer could not keep up
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn send(&self, line: String) {
        if self.tx.try_send(line).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl EventSink for JsonLinesSink {
    fn write(&self, severity: Severity, message: &str) {
        let line = json!({
            "timestamp": format_timestamp(system_time_nanos()),
            "severity": severity,
            "message": message,
        });
        self.send(line.to_string());
    }

    fn write_record(&self, record: &EventRecord<'_>) {
        let line = json!({
            "timestamp": format_timestamp(record.timestamp),
            "severity": Severity::Info,
            "message": record.to_string(),
            "event": record,
        });
        self.send(line.to_string());
    }
}

/// Sink fanning out to several sinks
#[derive(Default, Clone)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl TeeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for TeeSink {
    fn write(&self, severity: Severity, message: &str) {
        for sink in &self.sinks {
            sink.write(severity, message);
        }
    }

    fn write_record(&self, record: &EventRecord<'_>) {
        for sink in &self.sinks {
            sink.write_record(record);
        }
    }
}

/// Sink keeping every line in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Messages written with the given severity
    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl EventSink for MemorySink {
    fn write(&self, severity: Severity, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((severity, message.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookwatch_shared::{Caller, Category, EventFields};

    #[test]
    fn test_memory_sink_splits_by_severity() {
        let sink = MemorySink::new();
        sink.write(Severity::Info, "one");
        sink.write(Severity::Warning, "two");
        assert_eq!(sink.messages(Severity::Info), vec!["one".to_string()]);
        assert_eq!(sink.messages(Severity::Warning), vec!["two".to_string()]);
        sink.clear();
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn test_tee_sink_reaches_every_sink() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let tee = TeeSink::new().with(a.clone()).with(b.clone());
        tee.write(Severity::Warning, "capget failed");
        assert_eq!(a.lines().len(), 1);
        assert_eq!(b.lines().len(), 1);
    }

    #[tokio::test]
    async fn test_json_lines_sink_writes_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let (sink, writer) = JsonLinesSink::spawn(&path, 16).await.unwrap();
        let caller = Caller::new(7, "udhcpd");
        let record = EventRecord::new(
            Category::FsRead,
            "sys_close",
            &caller,
            EventFields::Close { fd: 4 },
        );
        sink.write_record(&record);
        sink.write(Severity::Warning, "sink test");
        drop(sink);

        assert_eq!(writer.await.unwrap().unwrap(), 2);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0]["event"]["operation"], "sys_close");
        assert_eq!(lines[0]["event"]["fields"]["fd"], 4);
        assert_eq!(lines[1]["severity"], "warning");
    }
}
