//! File system notifications for the watched log file.
//!
//! The watcher registers the *parent directory* of the log file with the
//! [`notify`] crate (non-recursively), so the watch survives the file being
//! created or replaced. Every raw notification is pushed into one of two
//! bounded channels, one for events and one for watcher errors; the tailing
//! loop decides which events matter using [`is_write_to`].
//!
//! The notify callback is kept lightweight: it never blocks and drops items
//! when a channel is full. Dropping the [`FileWatcher`] drops the channel
//! senders, which the consumer observes as closed channels.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use logdoc_forwarder::watcher::{is_write_to, resolve_log_path, FileWatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let log_path = resolve_log_path(Path::new("app.txt"))?;
//!     let (_watcher, mut channels) = FileWatcher::new(&log_path, 100)?;
//!
//!     while let Some(event) = channels.events.recv().await {
//!         if is_write_to(&event, &log_path) {
//!             println!("{} was written", log_path.display());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::path::{Path, PathBuf};

use notify::{
    event::ModifyKind, Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher or register the directory.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// Failed to resolve the log file path.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The log file path has no file name component.
    #[error("invalid log file path: {0}")]
    InvalidPath(PathBuf),

    /// The directory containing the log file does not exist.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    /// The event channel was closed.
    #[error("watcher event channel closed")]
    EventChannelClosed,

    /// The error channel was closed.
    #[error("watcher error channel closed")]
    ErrorChannelClosed,
}

/// Result type for watcher operations.
pub type Result<T> = std::result::Result<T, WatcherError>;

/// Receiving ends of the watcher's two channels.
#[derive(Debug)]
pub struct WatchChannels {
    /// Raw notify events for anything in the watched directory.
    pub events: mpsc::Receiver<Event>,

    /// Errors reported by the notify backend.
    pub errors: mpsc::Receiver<notify::Error>,
}

/// Watches the directory containing the log file.
#[derive(Debug)]
pub struct FileWatcher {
    /// Kept alive to maintain the watch subscription. Dropping this stops
    /// watching and closes both channels.
    #[allow(dead_code)]
    watcher: RecommendedWatcher,

    /// Absolute path of the log file.
    log_path: PathBuf,

    /// Directory registered with the notify backend.
    watch_dir: PathBuf,
}

impl FileWatcher {
    /// Starts watching the parent directory of `log_path`.
    ///
    /// `log_path` should already be absolute (see [`resolve_log_path`]) so it
    /// compares equal to the paths notify reports. `capacity` bounds each of
    /// the two channels.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `log_path` has no parent directory or it does not exist
    /// - The notify watcher cannot be created or the directory registered
    pub fn new(log_path: &Path, capacity: usize) -> Result<(Self, WatchChannels)> {
        let watch_dir = log_path
            .parent()
            .ok_or_else(|| WatcherError::InvalidPath(log_path.to_path_buf()))?
            .to_path_buf();

        if !watch_dir.is_dir() {
            return Err(WatcherError::DirectoryNotFound(watch_dir));
        }

        let (events_tx, events_rx) = mpsc::channel::<Event>(capacity);
        let (errors_tx, errors_rx) = mpsc::channel::<notify::Error>(capacity);

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| {
                handle_notify_event(res, &events_tx, &errors_tx);
            },
            Config::default(),
        )?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        debug!(
            watch_dir = %watch_dir.display(),
            log_path = %log_path.display(),
            "Started directory watch"
        );

        let watcher = Self {
            watcher,
            log_path: log_path.to_path_buf(),
            watch_dir,
        };

        Ok((
            watcher,
            WatchChannels {
                events: events_rx,
                errors: errors_rx,
            },
        ))
    }

    /// Absolute path of the log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Directory registered with the notify backend.
    #[must_use]
    pub fn watch_dir(&self) -> &Path {
        &self.watch_dir
    }
}

/// Resolves `path` to the absolute form notify reports for it.
///
/// The parent directory is canonicalized (it must exist), the file itself
/// does not need to exist yet.
///
/// # Errors
///
/// Returns an error if the path has no file name, the parent directory does
/// not exist, or the current directory cannot be determined.
pub fn resolve_log_path(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)?;

    let file_name = absolute
        .file_name()
        .ok_or_else(|| WatcherError::InvalidPath(absolute.clone()))?;
    let parent = absolute
        .parent()
        .ok_or_else(|| WatcherError::InvalidPath(absolute.clone()))?;

    if !parent.is_dir() {
        return Err(WatcherError::DirectoryNotFound(parent.to_path_buf()));
    }

    Ok(parent.canonicalize()?.join(file_name))
}

/// Returns true if `event` is a data write to exactly `path`.
///
/// Creation, metadata, access, rename and removal events do not count, nor
/// do writes to other files in the same directory.
#[must_use]
pub fn is_write_to(event: &Event, path: &Path) -> bool {
    let is_write = matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    );
    is_write && event.paths.iter().any(|p| p == path)
}

/// Handles callbacks from the notify backend thread.
fn handle_notify_event(
    res: std::result::Result<Event, notify::Error>,
    events_tx: &mpsc::Sender<Event>,
    errors_tx: &mpsc::Sender<notify::Error>,
) {
    match res {
        Ok(event) => {
            trace!(kind = ?event.kind, paths = ?event.paths, "Received notify event");
            // try_send keeps the notify thread from blocking; a full
            // channel drops the event.
            if let Err(e) = events_tx.try_send(event) {
                warn!(error = %e, "Failed to queue watch event, channel may be full");
            }
        }
        Err(err) => {
            if let Err(e) = errors_tx.try_send(err) {
                warn!(error = %e, "Failed to queue watcher error, channel may be full");
            }
        }
    }
}
