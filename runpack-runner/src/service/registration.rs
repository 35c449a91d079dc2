//! Registration service
//!
//! Establishes the identity the runner polls under. A stored identity is
//! reused after the queue service confirms it still exists; otherwise the
//! runner registers once and persists what the service assigned.

use runpack_core::domain::runner::RunnerIdentity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::IdentityError;
use crate::repository::{FileIdentityStore, RegisterError, RunnerRepository, generate_name};

/// Capped exponential backoff for first-run registration
///
/// The queue service may still be starting when the runner comes up
/// (common in container environments). Only requests that never reached
/// the service are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

pub struct RegistrationService {
    runners: Arc<dyn RunnerRepository>,
    store: FileIdentityStore,
    retry: RetryPolicy,
}

impl RegistrationService {
    pub fn new(runners: Arc<dyn RunnerRepository>, store: FileIdentityStore) -> Self {
        Self {
            runners,
            store,
            retry: RetryPolicy::default(),
        }
    }

    #[allow(dead_code)]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Loads and verifies the stored identity, or registers a new one
    ///
    /// # Arguments
    /// * `capabilities` - Job types advertised on first registration
    pub async fn ensure_registered(
        &self,
        capabilities: Vec<String>,
    ) -> Result<RunnerIdentity, IdentityError> {
        match self.store.load()? {
            Some(identity) => {
                info!("Loaded existing runner configuration: {}", identity.runner_name);
                info!("Runner ID: {}", identity.runner_id);
                self.verify(&identity).await?;
                Ok(identity)
            }
            None => self.register(capabilities).await,
        }
    }

    async fn verify(&self, identity: &RunnerIdentity) -> Result<(), IdentityError> {
        info!("Verifying runner registration...");

        match self.runners.verify_runner(&identity.runner_id).await {
            Ok(true) => {
                info!("Runner registration verified successfully");
                Ok(())
            }
            Ok(false) => Err(IdentityError::NotRecognized {
                runner_id: identity.runner_id.clone(),
                path: self.store.path().to_path_buf(),
            }),
            Err(e) => {
                error!("Failed to verify runner registration: {:#}", e);
                Err(IdentityError::VerificationUnavailable {
                    message: format!("{:#}", e),
                })
            }
        }
    }

    async fn register(&self, capabilities: Vec<String>) -> Result<RunnerIdentity, IdentityError> {
        let runner_name = generate_name();
        let runner_id = self.register_with_retry(&runner_name, capabilities.clone()).await?;

        let identity = RunnerIdentity::new(runner_id, runner_name);
        self.store.save(&identity)?;

        info!("Registered new runner: {}", identity.runner_name);
        info!("Runner ID: {}", identity.runner_id);
        info!("Capabilities: {:?}", capabilities);

        Ok(identity)
    }

    async fn register_with_retry(
        &self,
        runner_name: &str,
        capabilities: Vec<String>,
    ) -> Result<String, IdentityError> {
        let mut attempt = 0;
        let mut delay = self.retry.initial_delay;

        loop {
            attempt += 1;

            match self
                .runners
                .register_runner(runner_name, capabilities.clone())
                .await
            {
                Ok(runner_id) => {
                    if attempt > 1 {
                        info!("Registered with queue service after {} attempt(s)", attempt);
                    }
                    return Ok(runner_id);
                }
                Err(RegisterError::Failed(e)) => {
                    error!(
                        "Registration request failed after reaching the queue service; not retrying: {:#}",
                        e
                    );
                    return Err(IdentityError::RegistrationFailed {
                        attempts: attempt,
                        message: format!("{:#}", e),
                    });
                }
                Err(RegisterError::NotDelivered(e)) => {
                    if attempt >= self.retry.max_attempts {
                        error!(
                            "Failed to register with queue service after {} attempts",
                            attempt
                        );
                        return Err(IdentityError::RegistrationFailed {
                            attempts: attempt,
                            message: format!("{:#}", e),
                        });
                    }

                    warn!(
                        "Failed to reach queue service (attempt {}/{}): {:#}",
                        attempt, self.retry.max_attempts, e
                    );
                    warn!("Retrying in {:?}...", delay);

                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.retry.max_delay);
                }
            }
        }
    }
}
