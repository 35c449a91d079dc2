//! Console transcript shared between a handler and its reporter

use std::sync::{Arc, Mutex, PoisonError};

/// Accumulating, timestamped console log for one job
///
/// Lines are only ever appended, so successive snapshots never shrink.
/// Appending and snapshotting take the same lock, which keeps a snapshot
/// from observing a partially written line.
#[derive(Debug, Clone, Default)]
pub struct ConsoleLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a line prefixed with the local time
    pub fn log(&self, message: impl AsRef<str>) {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{}] {}", timestamp, message.as_ref());
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    /// Returns the whole transcript joined with newlines
    pub fn snapshot(&self) -> String {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .join("\n")
    }
}
