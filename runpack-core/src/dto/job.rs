//! Job DTOs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::domain::heartbeat::Heartbeat;
use crate::domain::job::JobDescriptor;

/// Request for jobs the runner is able to execute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableJobsRequest {
    pub runner_id: String,
    pub job_types: Vec<String>,
}

/// Jobs currently waiting for a runner, in service order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableJobsResponse {
    #[serde(default)]
    pub jobs: Vec<JobDescriptor>,
}

/// Request to take exclusive ownership of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimJobRequest {
    pub runner_id: String,
}

/// Job handed out by a successful claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimJobResponse {
    pub job: JobDescriptor,
}

/// Progress update for a running job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub runner_id: String,
    #[serde(flatten)]
    pub heartbeat: Heartbeat,
}

/// Successful terminal report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteJobRequest {
    pub runner_id: String,
    pub output_data: Map<String, JsonValue>,
    pub console_output: String,
}

/// Failed terminal report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorJobRequest {
    pub runner_id: String,
    pub error_message: String,
    pub console_output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_request_is_flat() {
        let request = HeartbeatRequest {
            runner_id: "R1".to_string(),
            heartbeat: Heartbeat::indeterminate("line"),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["runner_id"], "R1");
        assert_eq!(value["console_output"], "line");
        assert!(value["progress_current"].is_null());
    }

    #[test]
    fn test_available_jobs_tolerates_missing_list() {
        let response: AvailableJobsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.jobs.is_empty());
    }
}
