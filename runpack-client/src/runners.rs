//! Runner-related API endpoints

use crate::QueueClient;
use crate::error::Result;
use runpack_core::dto::runner::{RegisterRunner, RegisterRunnerResponse, VerifyRunnerResponse};
use tracing::debug;

impl QueueClient {
    // =============================================================================
    // Runner Registration & Verification
    // =============================================================================

    /// Register a new runner with the queue service
    ///
    /// Registration is not assumed to be idempotent: calling it twice yields
    /// two distinct runners. Only call it when no local identity exists.
    ///
    /// # Arguments
    /// * `name` - Human-readable runner name
    /// * `capabilities` - Job types this runner can execute
    ///
    /// # Returns
    /// The runner id assigned by the service
    pub async fn register_runner(&self, name: &str, capabilities: Vec<String>) -> Result<String> {
        let response = self
            .post(&["api", "runners", "register"])?
            .json(&RegisterRunner {
                name: name.to_string(),
                capabilities,
            })
            .send()
            .await?;

        let body: RegisterRunnerResponse = self.handle_response(response).await?;
        Ok(body.runner_id)
    }

    /// Check whether a runner id is still known to the queue service
    ///
    /// Returns `Ok(false)` when the service does not recognize the id and
    /// `Err` when the answer could not be obtained (transport failure or an
    /// unexpected status). Callers must not treat an error as "invalid".
    pub async fn verify_runner(&self, runner_id: &str) -> Result<bool> {
        let response = self
            .get(&["api", "runners", runner_id, "verify"])?
            .send()
            .await?;

        match self.handle_response::<VerifyRunnerResponse>(response).await {
            Ok(body) => Ok(body.valid),
            Err(e) if e.is_not_found() => {
                debug!("Runner {} not found by queue service", runner_id);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
