//! Incremental reader for the watched log file.
//!
//! [`LogTail`] owns the single byte offset into the file. Everything before
//! the offset has already been consumed; a read returns the entries parsed
//! from the bytes between the offset and the current end of file, together
//! with that end position. The offset only moves when the caller calls
//! [`LogTail::advance`], so a failed forward can leave it where it was.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{info, trace};

use crate::entry::LogEntry;

/// Result of reading the newly appended part of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailRead {
    /// Valid entries in file order.
    pub entries: Vec<LogEntry>,

    /// Byte position just after the last byte read.
    pub end: u64,
}

/// Byte-offset tailer for a single append-only file.
#[derive(Debug)]
pub struct LogTail {
    path: PathBuf,
    offset: u64,
}

impl LogTail {
    /// Creates a tailer positioned at the start of the file.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    /// Path of the tailed file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Moves the offset to `end`, typically the `end` of a previous [`TailRead`].
    pub fn advance(&mut self, end: u64) {
        self.offset = end;
    }

    /// Reads from the current offset to the end of the file and parses every
    /// line found there, including a final line without a trailing newline.
    ///
    /// If the file has shrunk below the offset it is treated as truncated and
    /// read from the beginning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, seeked or read. The
    /// offset is never modified by this method.
    pub fn read_new(&self) -> io::Result<TailRead> {
        let mut file = File::open(&self.path)?;
        let file_size = file.metadata()?.len();

        let start = if file_size < self.offset {
            info!(
                path = %self.path.display(),
                old_pos = self.offset,
                new_size = file_size,
                "File truncated, reading from start"
            );
            0
        } else {
            self.offset
        };

        file.seek(SeekFrom::Start(start))?;

        let mut buf = Vec::new();
        let read = file.read_to_end(&mut buf)?;
        let end = start + read as u64;

        if read == 0 {
            trace!(path = %self.path.display(), "No new bytes");
            return Ok(TailRead {
                entries: Vec::new(),
                end,
            });
        }

        let text = String::from_utf8_lossy(&buf);
        let entries = LogEntry::parse_lines(&text);

        trace!(
            path = %self.path.display(),
            start,
            end,
            entries = entries.len(),
            "Read appended bytes"
        );

        Ok(TailRead { entries, end })
    }
}
