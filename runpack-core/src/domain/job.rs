//! Job domain types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Snapshot of a job as offered or handed out by the queue service
///
/// The runner never mutates a descriptor; claiming one returns a fresh
/// snapshot that is then handed to the matching handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub job_type: String,
    #[serde(default)]
    pub input_params: Map<String, JsonValue>,
}

/// Terminal result of executing one claimed job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Success {
        output_data: Map<String, JsonValue>,
        console_output: String,
    },
    ParameterError {
        message: String,
    },
    ExecutionError {
        message: String,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    /// The message reported to the queue service for failed jobs
    pub fn error_message(&self) -> Option<&str> {
        match self {
            JobOutcome::Success { .. } => None,
            JobOutcome::ParameterError { message } | JobOutcome::ExecutionError { message } => {
                Some(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_defaults_missing_params() {
        let job: JobDescriptor =
            serde_json::from_str(r#"{"job_id": "j1", "job_type": "pose"}"#).unwrap();
        assert_eq!(job.job_id, "j1");
        assert!(job.input_params.is_empty());
    }

    #[test]
    fn test_outcome_error_message() {
        let outcome = JobOutcome::ParameterError {
            message: "Invalid parameters: bad".to_string(),
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.error_message(), Some("Invalid parameters: bad"));

        let outcome = JobOutcome::Success {
            output_data: Map::new(),
            console_output: String::new(),
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.error_message(), None);
    }
}
