//! Job-related API endpoints

use crate::QueueClient;
use crate::error::Result;
use runpack_core::domain::heartbeat::Heartbeat;
use runpack_core::domain::job::JobDescriptor;
use runpack_core::dto::job::{
    AvailableJobsRequest, AvailableJobsResponse, ClaimJobRequest, ClaimJobResponse,
    CompleteJobRequest, ErrorJobRequest, HeartbeatRequest,
};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

impl QueueClient {
    // =============================================================================
    // Job Discovery
    // =============================================================================

    /// List jobs waiting for a runner, restricted to the given job types
    ///
    /// # Returns
    /// The available jobs in the order the service offers them (may be empty)
    pub async fn get_available_jobs(
        &self,
        runner_id: &str,
        job_types: Vec<String>,
    ) -> Result<Vec<JobDescriptor>> {
        let response = self
            .post(&["api", "jobs", "available"])?
            .json(&AvailableJobsRequest {
                runner_id: runner_id.to_string(),
                job_types,
            })
            .send()
            .await?;

        let body: AvailableJobsResponse = self.handle_response(response).await?;
        Ok(body.jobs)
    }

    // =============================================================================
    // Job Execution (Runner-specific)
    // =============================================================================

    /// Claim a job for execution
    ///
    /// # Returns
    /// `Some(job)` if this runner now owns the job, `None` if another runner
    /// got it first (409) or it vanished between listing and claiming (404).
    pub async fn claim_job(&self, runner_id: &str, job_id: &str) -> Result<Option<JobDescriptor>> {
        let response = self
            .post(&["api", "jobs", job_id, "claim"])?
            .json(&ClaimJobRequest {
                runner_id: runner_id.to_string(),
            })
            .send()
            .await?;

        match self.handle_response::<ClaimJobResponse>(response).await {
            Ok(body) => Ok(Some(body.job)),
            Err(e) if e.is_conflict() || e.is_not_found() => {
                debug!("Job {} was not claimable: {}", job_id, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Send a progress heartbeat for a running job
    pub async fn send_heartbeat(
        &self,
        runner_id: &str,
        job_id: &str,
        heartbeat: Heartbeat,
    ) -> Result<()> {
        let response = self
            .post(&["api", "jobs", job_id, "heartbeat"])?
            .json(&HeartbeatRequest {
                runner_id: runner_id.to_string(),
                heartbeat,
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Report successful completion of a job
    pub async fn complete_job(
        &self,
        runner_id: &str,
        job_id: &str,
        output_data: Map<String, JsonValue>,
        console_output: String,
    ) -> Result<()> {
        let response = self
            .post(&["api", "jobs", job_id, "complete"])?
            .json(&CompleteJobRequest {
                runner_id: runner_id.to_string(),
                output_data,
                console_output,
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    /// Report that a job failed
    pub async fn error_job(
        &self,
        runner_id: &str,
        job_id: &str,
        error_message: String,
        console_output: String,
    ) -> Result<()> {
        let response = self
            .post(&["api", "jobs", job_id, "error"])?
            .json(&ErrorJobRequest {
                runner_id: runner_id.to_string(),
                error_message,
                console_output,
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}
