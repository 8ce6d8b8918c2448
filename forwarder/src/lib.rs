//! logdoc forwarder - mirrors an append-only log file into a Google Doc.
//!
//! # Overview
//!
//! The forwarder tails a single log file whose lines look like
//! `[<timestamp>] <level>: <message>`. Whenever the file is written, the
//! bytes appended since the last read are parsed and the valid entries are
//! inserted into a Google Docs document as one batch.
//!
//! # Modules
//!
//! - [`entry`]: Log line parsing
//! - [`tail`]: Byte-offset reader for the log file
//! - [`watcher`]: File system watcher for the log file's directory
//! - [`forwarder`]: The tailing loop
//! - [`sink`]: Document sink trait and Google Docs client
//! - [`credentials`]: Service-account key loading and access tokens
//! - [`config`]: Configuration from environment variables
//! - [`generator`]: Synthetic log writer
//! - [`error`]: Error types for forwarder operations

pub mod config;
pub mod credentials;
pub mod entry;
pub mod error;
pub mod forwarder;
pub mod generator;
pub mod sink;
pub mod tail;
pub mod watcher;

pub use config::{Config, ConfigError};
pub use credentials::{CredentialsError, ServiceAccountKey, TokenProvider};
pub use entry::LogEntry;
pub use error::{ForwarderError, Result};
pub use forwarder::{Forwarder, ReadOutcome};
pub use generator::{write_logs, GeneratorConfig};
pub use sink::{DocsClient, DocsConfig, DocumentSink, SinkError};
pub use tail::{LogTail, TailRead};
pub use watcher::{is_write_to, resolve_log_path, FileWatcher, WatchChannels, WatcherError};
