//! Per-invocation progress log.
//!
//! A reconciler receives its log explicitly instead of reaching for a
//! process-wide logger, so concurrent invocations against different devices
//! never share logging state. When no destination is configured the
//! [`NoopProgressLog`] drops every entry immediately.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::{debug, warn};

use crate::error::Error;
use crate::result::Result;

/// Append-only sink for timestamped progress events.
pub trait ProgressLog: Send + Sync {
    /// Append one event.
    fn record(&self, message: &str);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgressLog;

impl ProgressLog for NoopProgressLog {
    fn record(&self, _message: &str) {}
}

/// Appends `<timestamp> - <host> - <message>` lines to a file.
#[derive(Debug)]
pub struct FileProgressLog {
    path: PathBuf,
    host: String,
    file: Mutex<File>,
}

impl FileProgressLog {
    /// Open `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogFile`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, host: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::log_file(&path, e.to_string()))?;

        Ok(Self {
            path,
            host: host.into(),
            file: Mutex::new(file),
        })
    }

    /// The file this log appends to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressLog for FileProgressLog {
    fn record(&self, message: &str) {
        debug!(host = %self.host, "{message}");

        let line = format!(
            "{} - {} - {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            self.host,
            message
        );

        match self.file.lock() {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()) {
                    warn!(path = %self.path.display(), error = %e, "Failed to append progress entry");
                }
            }
            Err(_) => warn!(path = %self.path.display(), "Progress log lock poisoned"),
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryProgressLog {
    entries: Mutex<Vec<String>>,
}

impl MemoryProgressLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl ProgressLog for MemoryProgressLog {
    fn record(&self, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(message.to_string());
        }
    }
}

/// Open the progress log for one invocation against `host`.
///
/// # Errors
///
/// Returns [`Error::LogFile`] if a destination is configured but cannot be opened.
pub fn open_progress_log(path: Option<&Path>, host: &str) -> Result<Box<dyn ProgressLog>> {
    match path {
        Some(path) => Ok(Box::new(FileProgressLog::open(path, host)?)),
        None => Ok(Box::new(NoopProgressLog)),
    }
}
