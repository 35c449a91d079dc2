//! Runpack Runner
//!
//! A long-running worker that executes jobs from the Runpack job queue.
//!
//! Architecture:
//! - Configuration: Load settings from environment, CLI overrides
//! - Repositories: Queue service (runners, jobs) and the local identity file
//! - Handlers: One implementation per supported job type
//! - Services: Registration and supervised job execution
//! - Scheduler: Adaptive polling, claiming and the main loop
//! - Shutdown: Signal handling via a cancellation token
//!
//! The runner registers (or verifies its stored identity), then polls for
//! jobs it can handle, executes them one at a time while relaying
//! heartbeats, and reports every job's terminal status.

mod config;
mod error;
mod handlers;
mod repository;
mod scheduler;
mod service;
mod shutdown;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::handlers::HandlerRegistry;
use crate::repository::{FileIdentityStore, HttpJobRepository, HttpRunnerRepository};
use crate::scheduler::{JobPoller, PollInterval};
use crate::service::{CurrentJob, ExecutionService, RegistrationService, StandardExecutionService};
use runpack_client::QueueClient;

#[derive(Parser)]
#[command(name = "runpack-runner")]
#[command(about = "Runpack job runner", long_about = None)]
struct Cli {
    /// Location of the persisted runner identity
    #[arg(long, global = true, env = "RUNPACK_IDENTITY_FILE")]
    identity_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Register (or verify) this runner and start executing jobs
    Start {
        /// Runner API key
        #[arg(long, env = "RUNPACK_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },
    /// Print the stored runner identity
    Whoami,
    /// Delete the stored runner identity so the next start registers anew
    ResetIdentity,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "runpack_runner=info,runpack_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.identity_file {
        config = config.with_identity_file(path);
    }

    match cli.command.unwrap_or(Command::Start { api_key: None }) {
        Command::Start { api_key } => {
            if let Some(api_key) = api_key {
                config = config.with_api_key(api_key);
            }
            run(config).await
        }
        Command::Whoami => whoami(&config),
        Command::ResetIdentity => reset_identity(&config),
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    info!("Starting Runpack job runner");
    info!("Worker URL: {}", config.worker_url);
    info!(
        "Poll interval: {:?}-{:?} (progressive backoff, +{:?} per idle cycle)",
        config.min_poll_interval, config.max_poll_interval, config.poll_interval_increment
    );

    let http_client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let client = Arc::new(QueueClient::with_client(
        config.worker_url.clone(),
        config.api_key.clone(),
        http_client,
    ));

    let registry = Arc::new(HandlerRegistry::builtin(&config));
    let capabilities: Vec<String> = registry.supported_job_types().into_iter().collect();

    // Register the runner, or verify the stored identity
    let registration = RegistrationService::new(
        Arc::new(HttpRunnerRepository::new(Arc::clone(&client))),
        FileIdentityStore::new(config.identity_file.clone()),
    );
    let identity = match registration.ensure_registered(capabilities).await {
        Ok(identity) => identity,
        Err(e) => {
            if e.is_retryable() {
                error!("Runner could not start, try again later: {}", e);
            } else {
                error!("Runner identity requires operator action: {}", e);
            }
            return Err(e.into());
        }
    };
    info!("Running as {}", identity);

    let shutdown = CancellationToken::new();
    let current_job = CurrentJob::new();
    let signal_listener = shutdown::spawn_signal_listener(shutdown.clone(), current_job.clone());

    let jobs = Arc::new(HttpJobRepository::new(
        Arc::clone(&client),
        identity.runner_id.clone(),
    ));
    let executor: Arc<dyn ExecutionService> = Arc::new(StandardExecutionService::new(
        jobs.clone(),
        Arc::clone(&registry),
        current_job.clone(),
    ));

    let mut poller = JobPoller::new(
        PollInterval::new(
            config.min_poll_interval,
            config.max_poll_interval,
            config.poll_interval_increment,
        ),
        jobs,
        registry,
        executor,
        current_job,
        shutdown.clone(),
    );

    info!("Entering main polling loop...");
    poller.run().await;

    shutdown.cancel();
    let _ = signal_listener.await;

    info!("Runner stopped");
    Ok(())
}

fn whoami(config: &Config) -> Result<()> {
    let store = FileIdentityStore::new(config.identity_file.clone());
    match store.load()? {
        Some(identity) => {
            println!("Runner name: {}", identity.runner_name);
            println!("Runner ID:   {}", identity.runner_id);
            println!("Stored in:   {}", store.path().display());
        }
        None => println!(
            "No runner identity stored at {}; the runner will register on next start.",
            store.path().display()
        ),
    }
    Ok(())
}

fn reset_identity(config: &Config) -> Result<()> {
    let store = FileIdentityStore::new(config.identity_file.clone());
    if store.clear()? {
        println!(
            "Deleted runner identity at {}. The next start registers a new runner.",
            store.path().display()
        );
    } else {
        println!("No runner identity stored at {}.", store.path().display());
    }
    Ok(())
}
