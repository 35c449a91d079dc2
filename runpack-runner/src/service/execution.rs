//! Execution service
//!
//! Supervises one claimed job from handler lookup to terminal report:
//! - Resolves the handler for the job type
//! - Relays handler heartbeats to the queue service, best-effort
//! - Classifies the handler result
//! - Sends exactly one terminal report (complete or error)

use async_trait::async_trait;
use runpack_core::domain::heartbeat::Heartbeat;
use runpack_core::domain::job::{JobDescriptor, JobOutcome};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

use crate::handlers::{HandlerError, HandlerRegistry, HeartbeatSink};
use crate::repository::JobRepository;

/// Service trait for executing claimed jobs
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Executes a claimed job and reports its terminal status
    ///
    /// Never fails: every error is turned into a failure report.
    async fn execute_job(&self, job: JobDescriptor) -> JobOutcome;
}

/// Marker for the job currently being executed
///
/// Written only by the execution service, read by the shutdown path.
#[derive(Debug, Clone, Default)]
pub struct CurrentJob {
    slot: Arc<Mutex<Option<String>>>,
}

impl CurrentJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Marks `job_id` as current until the returned guard is dropped
    pub(crate) fn mark(&self, job_id: &str) -> CurrentJobGuard {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(job_id.to_string());
        CurrentJobGuard { job: self.clone() }
    }
}

pub(crate) struct CurrentJobGuard {
    job: CurrentJob,
}

impl Drop for CurrentJobGuard {
    fn drop(&mut self) {
        *self.job.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Forwards heartbeats for one job to the queue service
///
/// Delivery failures are logged and swallowed; a heartbeat whose console is
/// shorter than the previous one is dropped so the service never sees the
/// transcript go backwards.
struct HeartbeatRelay {
    job_id: String,
    jobs: Arc<dyn JobRepository>,
    last_console_len: Mutex<usize>,
}

impl HeartbeatRelay {
    fn new(job_id: String, jobs: Arc<dyn JobRepository>) -> Self {
        Self {
            job_id,
            jobs,
            last_console_len: Mutex::new(0),
        }
    }
}

#[async_trait]
impl HeartbeatSink for HeartbeatRelay {
    async fn beat(&self, heartbeat: Heartbeat) {
        {
            let mut last = self
                .last_console_len
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if heartbeat.console_output.len() < *last {
                warn!(
                    "Dropping heartbeat for job {}: console output shrank",
                    self.job_id
                );
                return;
            }
            *last = heartbeat.console_output.len();
        }

        let progress = (heartbeat.progress_current, heartbeat.progress_total);
        match self.jobs.send_heartbeat(&self.job_id, heartbeat).await {
            Ok(()) => debug!(
                "Sent heartbeat for job {}: {:?}/{:?}",
                self.job_id, progress.0, progress.1
            ),
            Err(e) => error!("Failed to send heartbeat for job {}: {:#}", self.job_id, e),
        }
    }
}

/// Standard implementation of ExecutionService
pub struct StandardExecutionService {
    jobs: Arc<dyn JobRepository>,
    registry: Arc<HandlerRegistry>,
    current_job: CurrentJob,
}

impl StandardExecutionService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        registry: Arc<HandlerRegistry>,
        current_job: CurrentJob,
    ) -> Self {
        Self {
            jobs,
            registry,
            current_job,
        }
    }

    /// Runs the handler and classifies its result
    async fn run_handler(&self, job: &JobDescriptor) -> JobOutcome {
        let handler = match self.registry.get(&job.job_type) {
            Ok(handler) => handler,
            Err(e) => {
                error!("Job {} cannot be dispatched: {}", job.job_id, e);
                return JobOutcome::ExecutionError {
                    message: format!("Job execution failed: {}", e),
                };
            }
        };

        let relay: Arc<dyn HeartbeatSink> = Arc::new(HeartbeatRelay::new(
            job.job_id.clone(),
            Arc::clone(&self.jobs),
        ));
        let params = job.input_params.clone();

        // A panicking handler must still produce a terminal report
        let result = tokio::spawn(async move { handler.execute(params, relay).await }).await;

        match result {
            Ok(Ok(output)) => JobOutcome::Success {
                output_data: output.output_data,
                console_output: output.console_output,
            },
            Ok(Err(HandlerError::InvalidParameters(message))) => {
                let message = format!("Invalid parameters: {}", message);
                error!("Job {} failed: {}", job.job_id, message);
                JobOutcome::ParameterError { message }
            }
            Ok(Err(HandlerError::Execution(message))) => {
                let message = format!("Job execution failed: {}", message);
                error!("Job {} failed: {}", job.job_id, message);
                JobOutcome::ExecutionError { message }
            }
            Err(e) => {
                error!("Handler for job {} did not finish: {:?}", job.job_id, e);
                JobOutcome::ExecutionError {
                    message: format!("Job execution failed: handler aborted ({})", e),
                }
            }
        }
    }

    /// Sends the single terminal report for `outcome`
    async fn report(&self, job_id: &str, outcome: &JobOutcome) {
        let result = match outcome {
            JobOutcome::Success {
                output_data,
                console_output,
            } => {
                self.jobs
                    .complete_job(job_id, output_data.clone(), console_output.clone())
                    .await
            }
            JobOutcome::ParameterError { message } | JobOutcome::ExecutionError { message } => {
                self.jobs
                    .error_job(job_id, message.clone(), message.clone())
                    .await
            }
        };

        if let Err(e) = result {
            error!("Failed to report terminal status of job {}: {:#}", job_id, e);
        }
    }
}

#[async_trait]
impl ExecutionService for StandardExecutionService {
    async fn execute_job(&self, job: JobDescriptor) -> JobOutcome {
        let _current = self.current_job.mark(&job.job_id);
        info!("Executing job {} of type '{}'", job.job_id, job.job_type);

        let outcome = self.run_handler(&job).await;
        self.report(&job.job_id, &outcome).await;

        if outcome.is_success() {
            info!("Successfully completed job {}", job.job_id);
        }

        outcome
    }
}
