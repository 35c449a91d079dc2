//! Runner domain model
//!
//! Represents the identity a runner is known by in the queue service.

use serde::{Deserialize, Serialize};

/// Identity assigned to a runner on its first successful registration
///
/// The `runner_id` is issued by the queue service and is authoritative once
/// persisted. It is only ever replaced as a whole, after an operator has
/// removed the local state and the runner registered again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerIdentity {
    /// Opaque identifier assigned by the queue service
    pub runner_id: String,

    /// Human-readable name, generated locally before registration
    pub runner_name: String,
}

impl RunnerIdentity {
    pub fn new(runner_id: impl Into<String>, runner_name: impl Into<String>) -> Self {
        Self {
            runner_id: runner_id.into(),
            runner_name: runner_name.into(),
        }
    }
}

impl std::fmt::Display for RunnerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.runner_name, self.runner_id)
    }
}
