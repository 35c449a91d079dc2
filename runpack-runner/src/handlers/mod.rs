//! Job handlers
//!
//! A handler implements one capability (job type). The supervisor looks it
//! up in the [`HandlerRegistry`], hands it the job parameters and a
//! [`HeartbeatSink`], and turns its result into a terminal report.
//!
//! Handlers own their progress reporting: long blocking work is wrapped in
//! a [`HeartbeatReporter`] scope so heartbeats keep flowing from a separate
//! task while the work itself runs on the blocking pool.

mod console;
pub mod pose_estimation;
mod registry;
mod reporter;

pub use console::ConsoleLog;
pub use registry::HandlerRegistry;
pub use reporter::HeartbeatReporter;

use async_trait::async_trait;
use runpack_core::domain::heartbeat::Heartbeat;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use thiserror::Error;

/// Receives heartbeats from a running handler
///
/// Delivery is best-effort. Implementations must not fail the caller, so
/// the method has no error to return.
#[async_trait]
pub trait HeartbeatSink: Send + Sync {
    async fn beat(&self, heartbeat: Heartbeat);
}

/// Successful handler result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutput {
    /// Output fields reported to the queue service
    pub output_data: Map<String, JsonValue>,

    /// Full console transcript of the job
    pub console_output: String,
}

/// Failure kinds a handler can report
///
/// The supervisor picks the report wording from the variant, so handlers
/// must use `InvalidParameters` only for problems with the job input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HandlerError {
    #[error("{0}")]
    InvalidParameters(String),

    #[error("{0}")]
    Execution(String),
}

impl HandlerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }
}

/// A handler for one job type
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Runs the job
    ///
    /// # Arguments
    /// * `params` - Job input parameters; the handler validates them itself
    /// * `heartbeat` - Sink for periodic progress and console snapshots
    ///
    /// Any reporter the handler starts must be stopped before this returns,
    /// on success and on failure.
    async fn execute(
        &self,
        params: Map<String, JsonValue>,
        heartbeat: Arc<dyn HeartbeatSink>,
    ) -> Result<HandlerOutput, HandlerError>;
}
