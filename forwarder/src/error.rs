//! Error types for the logdoc forwarder.
//!
//! Each module defines its own error enum; [`ForwarderError`] gathers them so
//! library entry points can return a single type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::credentials::CredentialsError;
use crate::sink::SinkError;
use crate::watcher::WatcherError;

/// Errors that can occur during forwarder operations.
#[derive(Error, Debug)]
pub enum ForwarderError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Loading or using the service-account credentials failed.
    #[error("credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    /// The remote document sink failed.
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for forwarder operations.
pub type Result<T> = std::result::Result<T, ForwarderError>;
