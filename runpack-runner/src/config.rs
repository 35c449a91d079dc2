//! Runner configuration
//!
//! Defines all configurable parameters for the runner: queue service
//! connection, identity file location, poll backoff bounds and heartbeat
//! cadence.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_WORKER_URL: &str = "http://localhost:8787";
pub const DEFAULT_POSE_ESTIMATION_COMMAND: &str = "figpack-nwb-pose-estimation";

/// Runner configuration
///
/// Poll bounds are whole seconds in the environment; they are kept as
/// `Duration` so the scheduler never mixes units.
#[derive(Clone)]
pub struct Config {
    /// Runner API key sent to the queue service
    pub api_key: String,

    /// Queue service base URL (e.g., "http://localhost:8787")
    pub worker_url: String,

    /// Where the runner identity is persisted
    pub identity_file: PathBuf,

    /// Poll interval used right after a job ran
    pub min_poll_interval: Duration,

    /// Upper bound the idle backoff never exceeds
    pub max_poll_interval: Duration,

    /// Amount added to the poll interval after each idle cycle
    pub poll_interval_increment: Duration,

    /// How often handlers report progress while a job is running
    pub heartbeat_interval: Duration,

    /// Timeout applied to every request to the queue service
    pub request_timeout: Duration,

    /// Program invoked by the pose estimation handler
    pub pose_estimation_command: String,
}

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - RUNPACK_API_KEY (required when starting the runner)
    /// - RUNPACK_WORKER_URL (optional, default: http://localhost:8787)
    /// - RUNPACK_IDENTITY_FILE (optional, default: $HOME/.runpack/runner.json)
    /// - RUNPACK_MIN_POLL_INTERVAL (optional, seconds, default: 5)
    /// - RUNPACK_MAX_POLL_INTERVAL (optional, seconds, default: 60)
    /// - RUNPACK_POLL_INTERVAL_INCREMENT (optional, seconds, default: 5)
    /// - RUNPACK_HEARTBEAT_INTERVAL (optional, seconds, default: 30)
    /// - RUNPACK_REQUEST_TIMEOUT (optional, seconds, default: 60)
    /// - RUNPACK_POSE_ESTIMATION_CMD (optional, default: figpack-nwb-pose-estimation)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let seconds = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };

        let identity_file = lookup("RUNPACK_IDENTITY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                let home = lookup("HOME").unwrap_or_else(|| ".".to_string());
                PathBuf::from(home).join(".runpack").join("runner.json")
            });

        Self {
            api_key: lookup("RUNPACK_API_KEY").unwrap_or_default(),
            worker_url: lookup("RUNPACK_WORKER_URL")
                .unwrap_or_else(|| DEFAULT_WORKER_URL.to_string()),
            identity_file,
            min_poll_interval: seconds("RUNPACK_MIN_POLL_INTERVAL", 5),
            max_poll_interval: seconds("RUNPACK_MAX_POLL_INTERVAL", 60),
            poll_interval_increment: seconds("RUNPACK_POLL_INTERVAL_INCREMENT", 5),
            heartbeat_interval: seconds("RUNPACK_HEARTBEAT_INTERVAL", 30),
            request_timeout: seconds("RUNPACK_REQUEST_TIMEOUT", 60),
            pose_estimation_command: lookup("RUNPACK_POSE_ESTIMATION_CMD")
                .unwrap_or_else(|| DEFAULT_POSE_ESTIMATION_COMMAND.to_string()),
        }
    }

    /// Overrides the API key
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = api_key;
        self
    }

    /// Overrides the identity file location
    pub fn with_identity_file(mut self, path: PathBuf) -> Self {
        self.identity_file = path;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("api_key cannot be empty (set RUNPACK_API_KEY or pass --api-key)");
        }

        if !self.worker_url.starts_with("http://") && !self.worker_url.starts_with("https://") {
            anyhow::bail!("worker_url must start with http:// or https://");
        }

        if self.min_poll_interval.is_zero() {
            anyhow::bail!("min_poll_interval must be greater than 0");
        }

        if self.min_poll_interval > self.max_poll_interval {
            anyhow::bail!("min_poll_interval cannot exceed max_poll_interval");
        }

        if self.poll_interval_increment.is_zero() {
            anyhow::bail!("poll_interval_increment must be greater than 0");
        }

        if self.heartbeat_interval.is_zero() {
            anyhow::bail!("heartbeat_interval must be greater than 0");
        }

        if self.pose_estimation_command.trim().is_empty() {
            anyhow::bail!("pose_estimation_command cannot be empty");
        }

        Ok(())
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("worker_url", &self.worker_url)
            .field("identity_file", &self.identity_file)
            .field("min_poll_interval", &self.min_poll_interval)
            .field("max_poll_interval", &self.max_poll_interval)
            .field("poll_interval_increment", &self.poll_interval_increment)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("request_timeout", &self.request_timeout)
            .field("pose_estimation_command", &self.pose_estimation_command)
            .finish()
    }
}
