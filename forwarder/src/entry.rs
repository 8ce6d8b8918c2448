//! Log line parsing for the forwarder.
//!
//! The watched file holds one record per line in the form
//! `[<timestamp>] <level>: <message>`. Parsing is best-effort: lines that do
//! not fit the shape are dropped rather than reported as errors.
//!
//! # Example
//!
//! ```
//! use logdoc_forwarder::entry::LogEntry;
//!
//! let entry = LogEntry::parse("[2024-01-01 10:00:00] INFO: started").unwrap();
//! assert_eq!(entry.timestamp, "2024-01-01 10:00:00");
//! assert_eq!(entry.level, "INFO");
//! assert_eq!(entry.message, "started");
//!
//! assert!(LogEntry::parse("no brackets here").is_none());
//! ```

use std::fmt;

/// A single structured log record.
///
/// Entries have no identity beyond their three fields. They are built per
/// line and consumed as soon as the batch they belong to is forwarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Text between the brackets, e.g. `2024-01-01 10:00:00`. Never empty.
    pub timestamp: String,

    /// Severity level, e.g. `INFO`.
    pub level: String,

    /// Everything after the first colon. May itself contain colons.
    pub message: String,
}

impl LogEntry {
    /// Parses one line of the log file.
    ///
    /// Returns `None` when the line has no `]` after trimming, no `:` after
    /// the bracket, or an empty timestamp.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let stripped = line.trim_matches(|c| c == '[' || c == ']');
        let (timestamp, rest) = stripped.split_once(']')?;
        let (level, message) = rest.trim().split_once(':')?;

        let timestamp = timestamp.trim();
        if timestamp.is_empty() {
            return None;
        }

        Some(Self {
            timestamp: timestamp.to_string(),
            level: level.trim().to_string(),
            message: message.trim().to_string(),
        })
    }

    /// Parses every line of `text` in order, dropping lines that do not match.
    #[must_use]
    pub fn parse_lines(text: &str) -> Vec<Self> {
        text.lines().filter_map(Self::parse).collect()
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.timestamp, self.level, self.message)
    }
}
