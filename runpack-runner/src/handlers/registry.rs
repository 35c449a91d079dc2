//! Handler registry
//!
//! Maps a job type to a factory producing its handler. The set of
//! registered job types doubles as the runner's capability list: it is
//! advertised at registration and used to filter every poll.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::JobHandler;
use super::pose_estimation::{self, PoseEstimationHandler};
use crate::config::Config;

/// Builds a fresh handler for one job
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn JobHandler> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown job type: '{0}'")]
    UnknownJobType(String),
}

/// Registry of job handlers keyed by job type
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every handler shipped with the runner
    pub fn builtin(config: &Config) -> Self {
        let mut registry = Self::new();

        let command = config.pose_estimation_command.clone();
        let heartbeat_interval = config.heartbeat_interval;
        registry.register(pose_estimation::JOB_TYPE, move || {
            Box::new(PoseEstimationHandler::new(command.clone(), heartbeat_interval))
        });

        registry
    }

    /// Registers a factory for `job_type`, replacing any previous one
    pub fn register<F>(&mut self, job_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn JobHandler> + Send + Sync + 'static,
    {
        let job_type = job_type.into();
        debug!("Registering handler for job type '{}'", job_type);
        self.factories.insert(job_type, Arc::new(factory));
    }

    /// Creates the handler for `job_type`
    pub fn get(&self, job_type: &str) -> Result<Box<dyn JobHandler>, RegistryError> {
        self.factories
            .get(job_type)
            .map(|factory| factory())
            .ok_or_else(|| RegistryError::UnknownJobType(job_type.to_string()))
    }

    /// All job types this registry can dispatch, sorted
    pub fn supported_job_types(&self) -> BTreeSet<String> {
        self.factories.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{HandlerError, HandlerOutput, HeartbeatSink};
    use async_trait::async_trait;
    use serde_json::{Map, Value as JsonValue};

    struct NoopHandler;

    #[async_trait]
    impl JobHandler for NoopHandler {
        async fn execute(
            &self,
            _params: Map<String, JsonValue>,
            _heartbeat: Arc<dyn HeartbeatSink>,
        ) -> Result<HandlerOutput, HandlerError> {
            Ok(HandlerOutput::default())
        }
    }

    #[test]
    fn test_supported_job_types_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register("zeta", || Box::new(NoopHandler));
        registry.register("alpha", || Box::new(NoopHandler));

        let types: Vec<String> = registry.supported_job_types().into_iter().collect();
        assert_eq!(types, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_unknown_job_type() {
        let registry = HandlerRegistry::new();
        let err = registry.get("missing").err().unwrap();
        assert!(matches!(err, RegistryError::UnknownJobType(ref t) if t == "missing"));
        assert_eq!(err.to_string(), "Unknown job type: 'missing'");
    }

    #[test]
    fn test_builtin_registry() {
        let config = Config::from_lookup(|_| None);
        let registry = HandlerRegistry::builtin(&config);

        assert!(
            registry
                .supported_job_types()
                .contains(pose_estimation::JOB_TYPE)
        );
        assert!(registry.get(pose_estimation::JOB_TYPE).is_ok());
    }
}
