//! Configuration module for the logdoc forwarder.
//!
//! Every setting has a built-in default, so the forwarder runs with no
//! environment at all. Variables only override the defaults.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LOGDOC_LOG_FILE` | `app.txt` | Log file to tail (relative to the working directory) |
//! | `LOGDOC_CREDENTIALS_FILE` | `creds.json` | Google service-account key file |
//! | `LOGDOC_DOCUMENT_ID` | built-in id | Target Google Docs document |
//! | `LOGDOC_DOCS_API_URL` | `https://docs.googleapis.com` | Docs API base URL |
//! | `LOGDOC_SETTLE_MS` | 100 | Delay after a write event before reading |
//! | `LOGDOC_CHANNEL_CAPACITY` | 1000 | Capacity of the watcher event channels |
//!
//! # Example
//!
//! ```no_run
//! use logdoc_forwarder::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Tailing: {}", config.log_file.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "app.txt";

/// Default service-account credential file name.
pub const DEFAULT_CREDENTIALS_FILE: &str = "creds.json";

/// Default target document.
pub const DEFAULT_DOCUMENT_ID: &str = "1V4qshUJ24_J_VIFJpYKZ9ZT5bv8aDN2Q5WWUhLiJTns";

/// Default Google Docs API base URL.
pub const DEFAULT_DOCS_API_URL: &str = "https://docs.googleapis.com";

/// Default settling delay in milliseconds.
const DEFAULT_SETTLE_MS: u64 = 100;

/// Default watcher channel capacity.
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Configuration for the forwarder.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log file to tail.
    pub log_file: PathBuf,

    /// Service-account JSON key used to authenticate against the Docs API.
    pub credentials_file: PathBuf,

    /// Identifier of the document entries are inserted into.
    pub document_id: String,

    /// Base URL of the Docs API, without a trailing slash.
    pub docs_api_url: String,

    /// How long to wait after a write notification before reading.
    pub settle_delay: Duration,

    /// Capacity of the event and error channels fed by the watcher.
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            document_id: DEFAULT_DOCUMENT_ID.to_string(),
            docs_api_url: DEFAULT_DOCS_API_URL.to_string(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Creates a new `Config` by applying environment overrides to the defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if:
    /// - `LOGDOC_DOCUMENT_ID` or `LOGDOC_DOCS_API_URL` is set but empty
    /// - `LOGDOC_SETTLE_MS` is not a non-negative integer
    /// - `LOGDOC_CHANNEL_CAPACITY` is not a positive integer
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_file = env::var("LOGDOC_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        let credentials_file = env::var("LOGDOC_CREDENTIALS_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.credentials_file);

        let document_id = match env::var("LOGDOC_DOCUMENT_ID") {
            Ok(val) => non_empty("LOGDOC_DOCUMENT_ID", val)?,
            Err(_) => defaults.document_id,
        };

        let docs_api_url = match env::var("LOGDOC_DOCS_API_URL") {
            Ok(val) => non_empty("LOGDOC_DOCS_API_URL", val)?
                .trim_end_matches('/')
                .to_string(),
            Err(_) => defaults.docs_api_url,
        };

        let settle_delay = match env::var("LOGDOC_SETTLE_MS") {
            Ok(val) => Duration::from_millis(parse_number::<u64>("LOGDOC_SETTLE_MS", &val)?),
            Err(_) => defaults.settle_delay,
        };

        let channel_capacity = match env::var("LOGDOC_CHANNEL_CAPACITY") {
            Ok(val) => {
                let capacity = parse_number::<usize>("LOGDOC_CHANNEL_CAPACITY", &val)?;
                if capacity == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "LOGDOC_CHANNEL_CAPACITY".to_string(),
                        message: "channel capacity must be greater than 0".to_string(),
                    });
                }
                capacity
            }
            Err(_) => defaults.channel_capacity,
        };

        Ok(Self {
            log_file,
            credentials_file,
            document_id,
            docs_api_url,
            settle_delay,
            channel_capacity,
        })
    }
}

fn non_empty(key: &str, val: String) -> Result<String, ConfigError> {
    let trimmed = val.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn parse_number<T: FromStr>(key: &str, val: &str) -> Result<T, ConfigError> {
    val.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected non-negative integer, got '{val}'"),
    })
}
