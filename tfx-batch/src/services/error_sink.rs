//! Shared append-only error log
//!
//! One writer task owns the log file; every pipeline run holds a cloneable
//! [`ErrorSink`] handle and sends entries over a channel. Each entry becomes
//! exactly one line `[YYYY-MM-DD HH:MM:SS] <message>`, written with a single
//! `write_all`, so concurrent producers never interleave partial lines.
//!
//! The file is opened (append, create) on the first entry, so a run with
//! nothing to report leaves an existing log untouched and creates no file.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tfx_common::time::{format_log_timestamp, now};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};

/// One timestamped failure or skip event
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl ErrorLogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: now(),
            message: message.into(),
        }
    }

    /// Render as one log line (no trailing newline)
    ///
    /// Embedded line breaks are folded to spaces so one entry is one line.
    pub fn to_line(&self) -> String {
        let message: String = self
            .message
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        format!("[{}] {}", format_log_timestamp(&self.timestamp), message.trim_end())
    }
}

enum SinkCommand {
    Append(ErrorLogEntry),
    Flush(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

/// Cloneable handle to the shared error log
#[derive(Clone)]
pub struct ErrorSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
    recorded: Arc<AtomicUsize>,
    path: Arc<PathBuf>,
}

impl ErrorSink {
    /// Start the writer task for the log at `path`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path.clone(), rx));

        Self {
            tx,
            recorded: Arc::new(AtomicUsize::new(0)),
            path: Arc::new(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, stamped with the current local time
    pub fn record(&self, message: impl Into<String>) {
        self.record_entry(ErrorLogEntry::new(message));
    }

    pub fn record_entry(&self, entry: ErrorLogEntry) {
        tracing::warn!(target: "tfx_batch::error_log", "{}", entry.message);
        self.recorded.fetch_add(1, Ordering::Relaxed);

        if self.tx.send(SinkCommand::Append(entry)).is_err() {
            tracing::error!(path = %self.path.display(), "Error log writer is closed, entry dropped");
        }
    }

    /// Entries recorded through any handle of this sink
    pub fn recorded_count(&self) -> usize {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Wait until every entry sent before this call is on disk
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SinkCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Drain pending entries and stop the writer
    ///
    /// Entries recorded after close are dropped with an error event.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(SinkCommand::Close(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn run_writer(path: PathBuf, mut rx: mpsc::UnboundedReceiver<SinkCommand>) {
    let mut file: Option<File> = None;

    while let Some(command) = rx.recv().await {
        match command {
            SinkCommand::Append(entry) => {
                if file.is_none() {
                    match open_append(&path).await {
                        Ok(opened) => file = Some(opened),
                        Err(e) => {
                            tracing::error!(
                                path = %path.display(),
                                error = %e,
                                "Failed to open error log"
                            );
                            continue;
                        }
                    }
                }

                if let Some(f) = file.as_mut() {
                    let mut line = entry.to_line();
                    line.push('\n');
                    if let Err(e) = f.write_all(line.as_bytes()).await {
                        tracing::error!(path = %path.display(), error = %e, "Failed to append to error log");
                    }
                }
            }
            SinkCommand::Flush(ack) => {
                flush_file(&mut file, &path).await;
                let _ = ack.send(());
            }
            SinkCommand::Close(ack) => {
                flush_file(&mut file, &path).await;
                let _ = ack.send(());
                break;
            }
        }
    }

    flush_file(&mut file, &path).await;
}

async fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

async fn flush_file(file: &mut Option<File>, path: &Path) {
    if let Some(f) = file.as_mut() {
        if let Err(e) = f.flush().await {
            tracing::error!(path = %path.display(), error = %e, "Failed to flush error log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_entry_line_format() {
        let entry = ErrorLogEntry {
            timestamp: Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap(),
            message: "Failed to download audio for urlA: boom".to_string(),
        };
        assert_eq!(
            entry.to_line(),
            "[2024-03-09 07:05:01] Failed to download audio for urlA: boom"
        );
    }

    #[test]
    fn test_multiline_message_is_folded() {
        let entry = ErrorLogEntry::new("first\nsecond\r\n");
        let line = entry.to_line();
        assert!(!line.contains('\n'));
        assert!(line.ends_with("first second"));
    }

    #[tokio::test]
    async fn test_entries_are_appended_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("error_log.txt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[2000-01-01 00:00:00] earlier run\n").unwrap();

        let sink = ErrorSink::open(&path);
        sink.record("one");
        sink.record("two");
        sink.flush().await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].ends_with("] one"));
        assert!(lines[2].ends_with("] two"));
        assert_eq!(sink.recorded_count(), 2);
    }

    #[tokio::test]
    async fn test_no_entries_creates_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error_log.txt");

        let sink = ErrorSink::open(&path);
        sink.flush().await;
        sink.close().await;

        assert!(!path.exists());
        assert_eq!(sink.recorded_count(), 0);
    }

    #[tokio::test]
    async fn test_clones_share_one_writer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error_log.txt");

        let sink = ErrorSink::open(&path);
        let clone = sink.clone();
        clone.record("from clone");
        sink.record("from original");
        sink.close().await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(clone.recorded_count(), 2);
    }
}
