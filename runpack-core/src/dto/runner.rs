//! Runner DTOs
//!
//! Data transfer objects for runner registration and verification.

use serde::{Deserialize, Serialize};

/// Request to register a runner with the queue service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRunner {
    /// Locally generated human-readable name
    pub name: String,

    /// Job types this runner can execute
    pub capabilities: Vec<String>,
}

/// Response to a successful registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRunnerResponse {
    /// Identifier assigned by the queue service
    pub runner_id: String,
}

/// Response to a runner verification request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRunnerResponse {
    pub valid: bool,
}
