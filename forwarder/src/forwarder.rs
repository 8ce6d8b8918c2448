//! The tailing loop.
//!
//! [`Forwarder`] owns the byte offset (through [`LogTail`]) and the sink. It
//! has a single state, watching, and leaves it only when one of the watcher
//! channels closes.
//!
//! Offset rules:
//!
//! - Initial catch-up reads the whole file, forwards whatever parsed, and
//!   moves the offset to the end even if forwarding failed.
//! - After a qualifying write event the offset moves to the new end when the
//!   batch was forwarded or when nothing in the new bytes parsed.
//! - A read failure or a failed forward leaves the offset untouched, so the
//!   same bytes are read again on the next qualifying event.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::Event;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::sink::DocumentSink;
use crate::tail::LogTail;
use crate::watcher::{is_write_to, WatcherError};

/// What happened to one read of the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A batch was forwarded and the offset advanced.
    Forwarded { entries: usize, offset: u64 },

    /// The new bytes held no valid entries; the offset advanced past them.
    NothingToForward { offset: u64 },

    /// The file could not be read; the offset is unchanged.
    ReadFailed,

    /// The sink rejected the batch; the offset is unchanged.
    ForwardFailed,
}

/// Tails one log file and forwards parsed batches to a sink.
#[derive(Debug)]
pub struct Forwarder<S> {
    tail: LogTail,
    sink: S,
    settle_delay: Duration,
}

impl<S: DocumentSink> Forwarder<S> {
    /// Creates a forwarder for `log_path` starting at offset 0.
    ///
    /// `log_path` is compared verbatim against event paths, so it should
    /// come from [`crate::watcher::resolve_log_path`].
    #[must_use]
    pub fn new(log_path: PathBuf, sink: S, settle_delay: Duration) -> Self {
        Self {
            tail: LogTail::new(log_path),
            sink,
            settle_delay,
        }
    }

    /// Path of the tailed file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.tail.path()
    }

    /// Current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.tail.offset()
    }

    /// The sink batches are forwarded to.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Forwards everything already in the file and moves the offset to its
    /// end. A forward failure is logged and the offset still moves.
    pub async fn catch_up(&mut self) -> ReadOutcome {
        let read = match self.tail.read_new() {
            Ok(read) => read,
            Err(e) => {
                warn!(
                    path = %self.tail.path().display(),
                    error = %e,
                    "Initial read failed, starting from offset 0"
                );
                return ReadOutcome::ReadFailed;
            }
        };

        let outcome = if read.entries.is_empty() {
            ReadOutcome::NothingToForward { offset: read.end }
        } else {
            match self.sink.forward(&read.entries).await {
                Ok(()) => ReadOutcome::Forwarded {
                    entries: read.entries.len(),
                    offset: read.end,
                },
                Err(e) => {
                    error!(error = %e, "Error appending initial entries");
                    ReadOutcome::ForwardFailed
                }
            }
        };

        self.tail.advance(read.end);

        info!(
            path = %self.tail.path().display(),
            offset = read.end,
            entries = read.entries.len(),
            "Initial catch-up complete"
        );

        outcome
    }

    /// Handles one raw watcher event. Returns `None` if the event was not a
    /// write to the log file.
    pub async fn handle_event(&mut self, event: &Event) -> Option<ReadOutcome> {
        if !is_write_to(event, self.tail.path()) {
            trace!(kind = ?event.kind, paths = ?event.paths, "Ignoring event");
            return None;
        }

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        Some(self.forward_new_entries().await)
    }

    /// Reads from the current offset and forwards whatever parsed.
    pub async fn forward_new_entries(&mut self) -> ReadOutcome {
        let read = match self.tail.read_new() {
            Ok(read) => read,
            Err(e) => {
                warn!(
                    path = %self.tail.path().display(),
                    offset = self.tail.offset(),
                    error = %e,
                    "Error reading new entries"
                );
                return ReadOutcome::ReadFailed;
            }
        };

        if read.entries.is_empty() {
            debug!(
                offset = self.tail.offset(),
                end = read.end,
                "No valid entries in appended bytes"
            );
            self.tail.advance(read.end);
            return ReadOutcome::NothingToForward { offset: read.end };
        }

        if let Err(e) = self.sink.forward(&read.entries).await {
            error!(
                error = %e,
                entries = read.entries.len(),
                offset = self.tail.offset(),
                "Error appending to doc, offset not advanced"
            );
            return ReadOutcome::ForwardFailed;
        }

        self.tail.advance(read.end);

        debug!(
            entries = read.entries.len(),
            offset = read.end,
            "Forwarded new entries"
        );

        ReadOutcome::Forwarded {
            entries: read.entries.len(),
            offset: read.end,
        }
    }

    /// Runs the watch loop until either channel closes.
    ///
    /// Watcher errors are logged and do not stop the loop.
    ///
    /// # Errors
    ///
    /// Always ends with [`WatcherError::EventChannelClosed`] or
    /// [`WatcherError::ErrorChannelClosed`].
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<Event>,
        mut errors: mpsc::Receiver<notify::Error>,
    ) -> Result<(), WatcherError> {
        info!(path = %self.tail.path().display(), "Watching log file");

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(WatcherError::EventChannelClosed);
                    };
                    self.handle_event(&event).await;
                }

                err = errors.recv() => {
                    let Some(err) = err else {
                        return Err(WatcherError::ErrorChannelClosed);
                    };
                    warn!(error = %err, "Watcher error");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogEntry;
    use crate::sink::SinkError;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use notify::EventKind;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Sink that records every batch and can be switched into failure mode.
    #[derive(Debug, Clone, Default)]
    struct RecordingSink {
        batches: Arc<Mutex<Vec<Vec<LogEntry>>>>,
        fail: Arc<AtomicBool>,
    }

    impl RecordingSink {
        fn batches(&self) -> Vec<Vec<LogEntry>> {
            self.batches.lock().unwrap().clone()
        }

        fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    impl DocumentSink for RecordingSink {
        async fn forward(&mut self, entries: &[LogEntry]) -> Result<(), SinkError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SinkError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            self.batches.lock().unwrap().push(entries.to_vec());
            Ok(())
        }
    }

    fn setup(content: &str) -> (TempDir, PathBuf, RecordingSink, Forwarder<RecordingSink>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.txt");
        fs::write(&path, content).unwrap();
        let sink = RecordingSink::default();
        let forwarder = Forwarder::new(path.clone(), sink.clone(), Duration::ZERO);
        (dir, path, sink, forwarder)
    }

    fn append(path: &Path, content: &str) {
        let mut file = OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    fn write_event(path: &Path) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(path.to_path_buf())
    }

    fn messages(batch: &[LogEntry]) -> Vec<&str> {
        batch.iter().map(|e| e.message.as_str()).collect()
    }

    #[tokio::test]
    async fn catch_up_forwards_existing_content_once() {
        let content = "[t1] INFO: one\n[t2] INFO: two\n";
        let (_dir, _path, sink, mut forwarder) = setup(content);

        let outcome = forwarder.catch_up().await;

        assert_eq!(
            outcome,
            ReadOutcome::Forwarded {
                entries: 2,
                offset: content.len() as u64
            }
        );
        assert_eq!(forwarder.offset(), content.len() as u64);
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(messages(&batches[0]), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn catch_up_on_empty_file_forwards_nothing() {
        let (_dir, _path, sink, mut forwarder) = setup("");

        let outcome = forwarder.catch_up().await;

        assert_eq!(outcome, ReadOutcome::NothingToForward { offset: 0 });
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn catch_up_advances_even_when_forward_fails() {
        let content = "[t1] INFO: one\n";
        let (_dir, _path, sink, mut forwarder) = setup(content);
        sink.set_failing(true);

        let outcome = forwarder.catch_up().await;

        assert_eq!(outcome, ReadOutcome::ForwardFailed);
        assert_eq!(forwarder.offset(), content.len() as u64);
    }

    #[tokio::test]
    async fn catch_up_with_missing_file_keeps_offset_zero() {
        let dir = tempfile::tempdir().unwrap();
        let sink = RecordingSink::default();
        let mut forwarder =
            Forwarder::new(dir.path().join("missing.txt"), sink.clone(), Duration::ZERO);

        assert_eq!(forwarder.catch_up().await, ReadOutcome::ReadFailed);
        assert_eq!(forwarder.offset(), 0);
    }

    #[tokio::test]
    async fn three_appended_lines_make_one_batch() {
        let (_dir, path, sink, mut forwarder) = setup("");
        forwarder.catch_up().await;

        append(&path, "[t1] INFO: a\n[t2] WARNING: b\n[t3] ERROR: c\n");
        let outcome = forwarder.handle_event(&write_event(&path)).await;

        assert!(matches!(
            outcome,
            Some(ReadOutcome::Forwarded { entries: 3, .. })
        ));
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(messages(&batches[0]), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn malformed_line_is_dropped_from_batch() {
        let (_dir, path, sink, mut forwarder) = setup("");
        forwarder.catch_up().await;

        append(&path, "[t1] INFO: good\nthis is not a log line\n");
        forwarder.handle_event(&write_event(&path)).await;

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(messages(&batches[0]), vec!["good"]);
    }

    #[tokio::test]
    async fn only_malformed_lines_still_advance_offset() {
        let (_dir, path, sink, mut forwarder) = setup("");
        forwarder.catch_up().await;

        append(&path, "garbage\n");
        let outcome = forwarder.handle_event(&write_event(&path)).await;

        assert_eq!(outcome, Some(ReadOutcome::NothingToForward { offset: 8 }));
        assert_eq!(forwarder.offset(), 8);
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn failed_forward_keeps_offset_and_resends_later() {
        let (_dir, path, sink, mut forwarder) = setup("");
        forwarder.catch_up().await;

        sink.set_failing(true);
        append(&path, "[t1] INFO: first\n");
        let outcome = forwarder.handle_event(&write_event(&path)).await;
        assert_eq!(outcome, Some(ReadOutcome::ForwardFailed));
        assert_eq!(forwarder.offset(), 0);

        sink.set_failing(false);
        append(&path, "[t2] INFO: second\n");
        forwarder.handle_event(&write_event(&path)).await;

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(messages(&batches[0]), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn read_failure_keeps_offset() {
        let (_dir, path, _sink, mut forwarder) = setup("[t1] INFO: one\n");
        forwarder.catch_up().await;
        let before = forwarder.offset();

        fs::remove_file(&path).unwrap();
        let outcome = forwarder.handle_event(&write_event(&path)).await;

        assert_eq!(outcome, Some(ReadOutcome::ReadFailed));
        assert_eq!(forwarder.offset(), before);
    }

    #[tokio::test]
    async fn non_write_events_are_ignored() {
        let (_dir, path, sink, mut forwarder) = setup("");
        forwarder.catch_up().await;
        append(&path, "[t1] INFO: one\n");

        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(path.clone());
        assert_eq!(forwarder.handle_event(&create).await, None);

        let other = write_event(&path.with_file_name("other.txt"));
        assert_eq!(forwarder.handle_event(&other).await, None);

        assert!(sink.batches().is_empty());
        assert_eq!(forwarder.offset(), 0);
    }

    #[tokio::test]
    async fn run_stops_when_event_channel_closes() {
        let (_dir, path, sink, mut forwarder) = setup("");
        forwarder.catch_up().await;

        let (events_tx, events_rx) = mpsc::channel(8);
        let (_errors_tx, errors_rx) = mpsc::channel(8);

        append(&path, "[t1] INFO: one\n");
        events_tx.send(write_event(&path)).await.unwrap();
        drop(events_tx);

        let result = forwarder.run(events_rx, errors_rx).await;

        assert!(matches!(result, Err(WatcherError::EventChannelClosed)));
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn run_stops_when_error_channel_closes() {
        let (_dir, _path, _sink, forwarder) = setup("");

        let (_events_tx, events_rx) = mpsc::channel::<Event>(8);
        let (errors_tx, errors_rx) = mpsc::channel(8);
        errors_tx
            .send(notify::Error::generic("transient"))
            .await
            .unwrap();
        drop(errors_tx);

        let result = forwarder.run(events_rx, errors_rx).await;
        assert!(matches!(result, Err(WatcherError::ErrorChannelClosed)));
    }
}
