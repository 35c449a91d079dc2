//! Job poller
//!
//! Polls the queue service for jobs this runner can handle and executes
//! them one at a time. The loop stops at the next cycle or sleep slice
//! after the shutdown token is cancelled; a job that is already running is
//! always allowed to reach its terminal report first.

use anyhow::Result;
use std::sync::Arc;
use tokio::time::{self, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::handlers::HandlerRegistry;
use crate::repository::JobRepository;
use crate::scheduler::PollInterval;
use crate::service::{CurrentJob, ExecutionService};

/// Granularity at which a sleeping poller notices shutdown
pub const DEFAULT_SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Job poller that continuously polls for and executes jobs
pub struct JobPoller {
    jobs: Arc<dyn JobRepository>,
    registry: Arc<HandlerRegistry>,
    executor: Arc<dyn ExecutionService>,
    interval: PollInterval,
    sleep_slice: Duration,
    current_job: CurrentJob,
    shutdown: CancellationToken,
}

impl JobPoller {
    /// Creates a new job poller
    ///
    /// # Arguments
    /// * `interval` - Poll interval with its backoff bounds
    /// * `jobs` - Job repository scoped to this runner
    /// * `registry` - Handlers; their job types filter every poll
    /// * `executor` - Runs claimed jobs to their terminal report
    /// * `current_job` - Marker of the job being executed
    /// * `shutdown` - Cancelled when the runner should stop
    pub fn new(
        interval: PollInterval,
        jobs: Arc<dyn JobRepository>,
        registry: Arc<HandlerRegistry>,
        executor: Arc<dyn ExecutionService>,
        current_job: CurrentJob,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            jobs,
            registry,
            executor,
            interval,
            sleep_slice: DEFAULT_SLEEP_SLICE,
            current_job,
            shutdown,
        }
    }

    #[allow(dead_code)]
    pub fn with_sleep_slice(mut self, sleep_slice: Duration) -> Self {
        self.sleep_slice = sleep_slice;
        self
    }

    /// Runs the polling loop until shutdown is requested
    pub async fn run(&mut self) {
        info!(
            "Starting job poller (interval: {:?}-{:?}, progressive backoff)",
            self.interval.min(),
            self.interval.max()
        );
        info!("Initial poll interval: {:?}", self.interval.current());

        while !self.shutdown.is_cancelled() {
            let executed = self.run_cycle().await;

            if self.interval.record(executed) {
                if executed {
                    info!(
                        "Job executed - resetting poll interval to {:?}",
                        self.interval.current()
                    );
                } else {
                    info!(
                        "No jobs available - increasing poll interval to {:?}",
                        self.interval.current()
                    );
                }
            }

            self.sleep_interruptibly().await;
        }

        if let Some(job_id) = self.current_job.get() {
            warn!("Shutting down with job {} still in progress", job_id);
        }

        info!("Job poller stopped");
    }

    /// Current poll interval
    #[allow(dead_code)]
    pub fn interval(&self) -> Duration {
        self.interval.current()
    }

    /// Runs one cycle, treating any failure as an idle cycle
    async fn run_cycle(&self) -> bool {
        match self.poll_and_execute_once().await {
            Ok(executed) => executed,
            Err(e) => {
                error!("Error during polling: {:#}", e);
                false
            }
        }
    }

    /// Performs a single poll cycle
    ///
    /// Claims the offered jobs in order until one succeeds and executes only
    /// that one. Returns whether a job was executed.
    async fn poll_and_execute_once(&self) -> Result<bool> {
        let job_types: Vec<String> = self.registry.supported_job_types().into_iter().collect();

        let available = self.jobs.fetch_available_jobs(job_types).await?;

        if available.is_empty() {
            debug!("No jobs available");
            return Ok(false);
        }

        debug!("Found {} available job(s)", available.len());

        for job in available {
            let claimed = self.jobs.claim_job(&job.job_id).await?;

            match claimed {
                Some(claimed) => {
                    info!("Claimed job {} of type '{}'", claimed.job_id, claimed.job_type);
                    self.executor.execute_job(claimed).await;
                    return Ok(true);
                }
                None => debug!("Failed to claim job {}, trying next one", job.job_id),
            }
        }

        debug!("All available jobs were claimed by other runners");
        Ok(false)
    }

    /// Sleeps for the current interval in slices, returning early on shutdown
    async fn sleep_interruptibly(&self) {
        let mut remaining = self.interval.current();

        while !remaining.is_zero() {
            let slice = remaining.min(self.sleep_slice);

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Shutdown requested during sleep");
                    return;
                }
                _ = time::sleep(slice) => {}
            }

            remaining -= slice;
        }
    }
}
