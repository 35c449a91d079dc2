//! Heartbeat domain type

use serde::{Deserialize, Serialize};

/// Progress and console snapshot relayed while a job is running
///
/// Heartbeats are never persisted by the runner. `console_output` is the
/// whole transcript accumulated so far for the job, not a delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub progress_current: Option<u64>,
    pub progress_total: Option<u64>,
    pub console_output: String,
}

impl Heartbeat {
    /// Heartbeat for opaque blocking work where progress is unknown
    pub fn indeterminate(console_output: impl Into<String>) -> Self {
        Self {
            progress_current: None,
            progress_total: None,
            console_output: console_output.into(),
        }
    }

    /// Heartbeat with known progress
    pub fn with_progress(current: u64, total: u64, console_output: impl Into<String>) -> Self {
        Self {
            progress_current: Some(current),
            progress_total: Some(total),
            console_output: console_output.into(),
        }
    }
}
