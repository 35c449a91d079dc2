//! Test doubles shared by the runner's unit tests

use anyhow::Result;
use async_trait::async_trait;
use runpack_core::domain::heartbeat::Heartbeat;
use runpack_core::domain::job::JobDescriptor;
use serde_json::{Map, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::handlers::{HandlerError, HandlerOutput, HeartbeatSink, JobHandler};
use crate::repository::JobRepository;

/// Calls observed by [`FakeJobRepository`]
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Fetch(Vec<String>),
    Claim(String),
    Heartbeat(String, Heartbeat),
    Complete(String, Map<String, JsonValue>, String),
    Error(String, String, String),
}

/// In-memory queue service double
#[derive(Default)]
pub(crate) struct FakeJobRepository {
    pub calls: Mutex<Vec<Call>>,
    pub available: Mutex<VecDeque<Result<Vec<JobDescriptor>, String>>>,
    pub claimable: Mutex<Vec<String>>,
    pub fail_heartbeats: bool,
    pub fail_reports: bool,
}

impl FakeJobRepository {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn push_available(&self, jobs: Vec<JobDescriptor>) {
        self.available.lock().unwrap().push_back(Ok(jobs));
    }

    pub fn push_fetch_error(&self, message: &str) {
        self.available
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn allow_claim(&self, job_id: &str) {
        self.claimable.lock().unwrap().push(job_id.to_string());
    }

    pub fn terminal_reports(&self, job_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| match call {
                Call::Complete(id, ..) | Call::Error(id, ..) => id == job_id,
                _ => false,
            })
            .count()
    }

    pub fn heartbeats(&self) -> Vec<Heartbeat> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Heartbeat(_, heartbeat) => Some(heartbeat),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl JobRepository for FakeJobRepository {
    async fn fetch_available_jobs(&self, job_types: Vec<String>) -> Result<Vec<JobDescriptor>> {
        self.calls.lock().unwrap().push(Call::Fetch(job_types));
        match self.available.lock().unwrap().pop_front() {
            Some(Ok(jobs)) => Ok(jobs),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn claim_job(&self, job_id: &str) -> Result<Option<JobDescriptor>> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Claim(job_id.to_string()));

        let mut claimable = self.claimable.lock().unwrap();
        match claimable.iter().position(|id| id == job_id) {
            Some(index) => {
                claimable.remove(index);
                Ok(Some(job(job_id, "test")))
            }
            None => Ok(None),
        }
    }

    async fn send_heartbeat(&self, job_id: &str, heartbeat: Heartbeat) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Heartbeat(job_id.to_string(), heartbeat));
        if self.fail_heartbeats {
            anyhow::bail!("heartbeat endpoint unavailable");
        }
        Ok(())
    }

    async fn complete_job(
        &self,
        job_id: &str,
        output_data: Map<String, JsonValue>,
        console_output: String,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Complete(
            job_id.to_string(),
            output_data,
            console_output,
        ));
        if self.fail_reports {
            anyhow::bail!("complete endpoint unavailable");
        }
        Ok(())
    }

    async fn error_job(
        &self,
        job_id: &str,
        error_message: String,
        console_output: String,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Error(
            job_id.to_string(),
            error_message,
            console_output,
        ));
        if self.fail_reports {
            anyhow::bail!("error endpoint unavailable");
        }
        Ok(())
    }
}

pub(crate) fn job(job_id: &str, job_type: &str) -> JobDescriptor {
    JobDescriptor {
        job_id: job_id.to_string(),
        job_type: job_type.to_string(),
        input_params: Map::new(),
    }
}

/// Handler whose behavior is chosen per test
pub(crate) struct ScriptedHandler {
    pub result: Result<HandlerOutput, HandlerError>,
    pub beats: usize,
}

#[async_trait]
impl JobHandler for ScriptedHandler {
    async fn execute(
        &self,
        _params: Map<String, JsonValue>,
        heartbeat: Arc<dyn HeartbeatSink>,
    ) -> Result<HandlerOutput, HandlerError> {
        let mut console = String::new();
        for i in 0..self.beats {
            console.push_str(&format!("line {}\n", i));
            heartbeat.beat(Heartbeat::indeterminate(console.clone())).await;
        }
        self.result.clone()
    }
}
