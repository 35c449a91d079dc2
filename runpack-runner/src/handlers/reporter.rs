//! Periodic heartbeat reporter
//!
//! Blocking handler work cannot yield to send its own heartbeats, so a
//! separate task does it on a timer. The reporter is only reachable through
//! [`HeartbeatReporter::scope`], which stops and joins the task before
//! returning, whichever way the work ended.

use runpack_core::domain::heartbeat::Heartbeat;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ConsoleLog, HeartbeatSink};

/// How long a stopping reporter waits for a heartbeat already being sent
const IN_FLIGHT_GRACE: Duration = Duration::from_secs(5);

/// Sends console snapshots with unknown progress at a fixed interval
pub struct HeartbeatReporter {
    sink: Arc<dyn HeartbeatSink>,
    console: ConsoleLog,
    interval: Duration,
}

impl HeartbeatReporter {
    pub fn new(sink: Arc<dyn HeartbeatSink>, console: ConsoleLog, interval: Duration) -> Self {
        Self {
            sink,
            console,
            interval,
        }
    }

    /// Runs `work` while heartbeats are being sent
    ///
    /// The first heartbeat goes out immediately. When `work` finishes the
    /// reporter is cancelled and joined before its output is returned, so
    /// no heartbeat is sent after this call completes. A heartbeat that is
    /// being sent at that moment is given up to five seconds to finish.
    pub async fn scope<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let guard = self.start();
        let output = work.await;
        guard.stop().await;
        output
    }

    fn start(&self) -> ReporterGuard {
        let token = CancellationToken::new();
        let sink = Arc::clone(&self.sink);
        let console = self.console.clone();
        let interval = self.interval;
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let heartbeat = Heartbeat::indeterminate(console.snapshot());
                let beat = sink.beat(heartbeat);
                tokio::pin!(beat);

                // A heartbeat already in flight must land before the job's
                // terminal report, so it gets a bounded grace period
                tokio::select! {
                    _ = &mut beat => {}
                    _ = task_token.cancelled() => {
                        if time::timeout(IN_FLIGHT_GRACE, beat).await.is_err() {
                            warn!(
                                "Abandoned heartbeat still in flight after {:?}",
                                IN_FLIGHT_GRACE
                            );
                        }
                        break;
                    }
                }
            }

            debug!("Heartbeat reporter stopped");
        });

        ReporterGuard {
            token,
            handle: Some(handle),
        }
    }
}

/// Handle to a running reporter task
///
/// Dropping the guard without calling [`ReporterGuard::stop`] (for example
/// when the enclosing future is dropped) aborts the task.
struct ReporterGuard {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ReporterGuard {
    async fn stop(mut self) {
        self.token.cancel();

        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!("Heartbeat reporter panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for ReporterGuard {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
