//! Shutdown controller
//!
//! Translates termination signals into cancellation of the runner's
//! shutdown token. Cancellation is cooperative: a job that is already
//! running is never interrupted.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::service::CurrentJob;

/// Spawns a task that cancels `shutdown` on Ctrl+C or SIGTERM
pub fn spawn_signal_listener(shutdown: CancellationToken, current_job: CurrentJob) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {}
            _ = shutdown.cancelled() => return,
        }

        request_shutdown(&shutdown, &current_job);
    })
}

/// Cancels the token and reports what will happen to the current job
pub fn request_shutdown(shutdown: &CancellationToken, current_job: &CurrentJob) {
    match current_job.get() {
        Some(job_id) => warn!(
            "Shutdown requested while job {} is running; it will finish before the runner exits",
            job_id
        ),
        None => info!("Shutdown requested, stopping runner..."),
    }

    shutdown.cancel();
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_shutdown_cancels_token() {
        let shutdown = CancellationToken::new();
        request_shutdown(&shutdown, &CurrentJob::new());
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_request_shutdown_leaves_running_job_alone() {
        let shutdown = CancellationToken::new();
        let current_job = CurrentJob::new();
        let _running = current_job.mark("J7");

        request_shutdown(&shutdown, &current_job);

        assert!(shutdown.is_cancelled());
        assert_eq!(current_job.get(), Some("J7".to_string()));
    }

    #[tokio::test]
    async fn test_listener_exits_when_token_cancelled_elsewhere() {
        let shutdown = CancellationToken::new();
        let handle = spawn_signal_listener(shutdown.clone(), CurrentJob::new());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
