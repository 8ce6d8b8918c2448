//! Synthetic log writer.
//!
//! Appends random but well-formed entries to a log file, one at a time, so
//! the forwarder can be exercised against a live file.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use rand::Rng;
use tracing::{debug, info};

use crate::entry::LogEntry;

/// Levels picked from when generating entries.
pub const LOG_LEVELS: [&str; 4] = ["INFO", "WARNING", "ERROR", "DEBUG"];

/// Messages picked from when generating entries.
pub const SAMPLE_MESSAGES: [&str; 10] = [
    "User logged in successfully",
    "Database connection established",
    "Failed to process request",
    "Cache cleared",
    "Memory usage high",
    "Network timeout occurred",
    "File processing completed",
    "Invalid input received",
    "System update initiated",
    "Configuration loaded",
];

/// Timestamp format of generated entries.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default number of entries written by [`write_logs`].
pub const DEFAULT_COUNT: usize = 1000;

/// Default pause between entries in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Settings for [`write_logs`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// File to append to. Created if missing.
    pub path: PathBuf,

    /// Number of entries to write.
    pub count: usize,

    /// Pause after each entry.
    pub delay: Duration,
}

impl GeneratorConfig {
    /// Creates a configuration with the default count and delay.
    #[must_use]
    pub fn with_defaults(path: PathBuf) -> Self {
        Self {
            path,
            count: DEFAULT_COUNT,
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
        }
    }
}

/// Builds one random entry stamped with the current local time.
#[must_use]
pub fn generate_entry<R: Rng>(rng: &mut R) -> LogEntry {
    LogEntry {
        timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
        level: LOG_LEVELS[rng.random_range(0..LOG_LEVELS.len())].to_string(),
        message: SAMPLE_MESSAGES[rng.random_range(0..SAMPLE_MESSAGES.len())].to_string(),
    }
}

/// Appends `config.count` entries to `config.path`, reopening the file in
/// append mode for every entry.
///
/// Returns the number of entries written.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written.
pub fn write_logs(config: &GeneratorConfig) -> io::Result<usize> {
    info!(
        path = %config.path.display(),
        count = config.count,
        "Starting to write log entries"
    );

    let mut rng = rand::rng();

    for i in 0..config.count {
        let entry = generate_entry(&mut rng);
        append_line(&config.path, &entry)?;

        debug!(written = i + 1, total = config.count, "Written log entry");

        if !config.delay.is_zero() {
            std::thread::sleep(config.delay);
        }
    }

    info!(count = config.count, "Log generation completed");
    Ok(config.count)
}

fn append_line(path: &Path, entry: &LogEntry) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{entry}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use std::fs;

    #[test]
    fn generated_entry_uses_known_values() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let entry = generate_entry(&mut rng);
            assert!(LOG_LEVELS.contains(&entry.level.as_str()));
            assert!(SAMPLE_MESSAGES.contains(&entry.message.as_str()));
            assert!(NaiveDateTime::parse_from_str(&entry.timestamp, TIMESTAMP_FORMAT).is_ok());
        }
    }

    #[test]
    fn generated_line_parses_back() {
        let entry = generate_entry(&mut rand::rng());
        assert_eq!(LogEntry::parse(&entry.to_string()), Some(entry));
    }

    #[test]
    fn write_logs_appends_parseable_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.txt");
        fs::write(&path, "[existing] INFO: kept\n").unwrap();

        let config = GeneratorConfig {
            path: path.clone(),
            count: 5,
            delay: Duration::ZERO,
        };
        assert_eq!(write_logs(&config).unwrap(), 5);

        let content = fs::read_to_string(&path).unwrap();
        let entries = LogEntry::parse_lines(&content);
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].message, "kept");
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn write_logs_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.txt");

        let config = GeneratorConfig {
            path: path.clone(),
            count: 2,
            delay: Duration::ZERO,
        };
        write_logs(&config).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = GeneratorConfig::with_defaults(PathBuf::from("app.txt"));
        assert_eq!(config.count, 1000);
        assert_eq!(config.delay, Duration::from_secs(1));
    }
}
