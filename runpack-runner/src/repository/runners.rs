//! Runners repository
//!
//! Handles registration and verification of this runner with the queue
//! service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use runpack_client::QueueClient;
use std::sync::Arc;
use thiserror::Error;

/// Failure of a single registration request
///
/// Registration is not idempotent, so callers need to know whether the
/// service could have acted on the request before sending it again.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The request never reached the service; sending it again is safe
    #[error("{0:#}")]
    NotDelivered(anyhow::Error),

    /// The service may have processed the request
    #[error("{0:#}")]
    Failed(anyhow::Error),
}

/// Repository trait for runner-related operations with the queue service
#[async_trait]
pub trait RunnerRepository: Send + Sync {
    /// Registers a new runner and returns the id the service assigned
    ///
    /// # Arguments
    /// * `name` - Locally generated runner name
    /// * `capabilities` - Job types this runner can execute
    async fn register_runner(
        &self,
        name: &str,
        capabilities: Vec<String>,
    ) -> std::result::Result<String, RegisterError>;

    /// Checks whether the service still knows `runner_id`
    ///
    /// `Ok(false)` means the id is definitively unknown; `Err` means the
    /// question could not be answered.
    async fn verify_runner(&self, runner_id: &str) -> Result<bool>;
}

/// HTTP implementation of RunnerRepository
pub struct HttpRunnerRepository {
    client: Arc<QueueClient>,
}

impl HttpRunnerRepository {
    pub fn new(client: Arc<QueueClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RunnerRepository for HttpRunnerRepository {
    async fn register_runner(
        &self,
        name: &str,
        capabilities: Vec<String>,
    ) -> std::result::Result<String, RegisterError> {
        self.client
            .register_runner(name, capabilities)
            .await
            .map_err(|e| {
                let not_delivered = e.is_connect();
                let e = anyhow::Error::new(e).context(format!("Failed to register runner '{}'", name));
                if not_delivered {
                    RegisterError::NotDelivered(e)
                } else {
                    RegisterError::Failed(e)
                }
            })
    }

    async fn verify_runner(&self, runner_id: &str) -> Result<bool> {
        self.client
            .verify_runner(runner_id)
            .await
            .with_context(|| format!("Failed to verify runner {}", runner_id))
    }
}
