//! Jobs repository
//!
//! Handles communication with the queue service for job-related operations:
//! - Listing available jobs
//! - Claiming jobs
//! - Relaying heartbeats
//! - Sending terminal reports (complete / error)

use anyhow::{Context, Result};
use async_trait::async_trait;
use runpack_client::QueueClient;
use runpack_core::domain::heartbeat::Heartbeat;
use runpack_core::domain::job::JobDescriptor;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Repository trait for job-related operations, scoped to one runner
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Lists jobs of the given types, in the order the service offers them
    async fn fetch_available_jobs(&self, job_types: Vec<String>) -> Result<Vec<JobDescriptor>>;

    /// Claims a job for execution
    ///
    /// Returns `None` when another runner claimed the job first.
    async fn claim_job(&self, job_id: &str) -> Result<Option<JobDescriptor>>;

    /// Sends a progress heartbeat for a running job
    async fn send_heartbeat(&self, job_id: &str, heartbeat: Heartbeat) -> Result<()>;

    /// Reports successful completion
    async fn complete_job(
        &self,
        job_id: &str,
        output_data: Map<String, JsonValue>,
        console_output: String,
    ) -> Result<()>;

    /// Reports a failed job
    async fn error_job(&self, job_id: &str, error_message: String, console_output: String)
    -> Result<()>;
}

/// HTTP implementation of JobRepository
pub struct HttpJobRepository {
    client: Arc<QueueClient>,
    runner_id: String,
}

impl HttpJobRepository {
    /// Creates a new HTTP job repository
    ///
    /// # Arguments
    /// * `client` - Shared queue client
    /// * `runner_id` - Identifier assigned to this runner at registration
    pub fn new(client: Arc<QueueClient>, runner_id: String) -> Self {
        Self { client, runner_id }
    }
}

#[async_trait]
impl JobRepository for HttpJobRepository {
    async fn fetch_available_jobs(&self, job_types: Vec<String>) -> Result<Vec<JobDescriptor>> {
        self.client
            .get_available_jobs(&self.runner_id, job_types)
            .await
            .context("Failed to fetch available jobs")
    }

    async fn claim_job(&self, job_id: &str) -> Result<Option<JobDescriptor>> {
        self.client
            .claim_job(&self.runner_id, job_id)
            .await
            .with_context(|| format!("Failed to claim job {}", job_id))
    }

    async fn send_heartbeat(&self, job_id: &str, heartbeat: Heartbeat) -> Result<()> {
        self.client
            .send_heartbeat(&self.runner_id, job_id, heartbeat)
            .await
            .with_context(|| format!("Failed to send heartbeat for job {}", job_id))
    }

    async fn complete_job(
        &self,
        job_id: &str,
        output_data: Map<String, JsonValue>,
        console_output: String,
    ) -> Result<()> {
        self.client
            .complete_job(&self.runner_id, job_id, output_data, console_output)
            .await
            .with_context(|| format!("Failed to report completion of job {}", job_id))
    }

    async fn error_job(
        &self,
        job_id: &str,
        error_message: String,
        console_output: String,
    ) -> Result<()> {
        self.client
            .error_job(&self.runner_id, job_id, error_message, console_output)
            .await
            .with_context(|| format!("Failed to report failure of job {}", job_id))
    }
}
