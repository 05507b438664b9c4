use crate::daemon::polling::PollLoop;
use crate::providers::StatusProbe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("a poll loop is already running")]
    AlreadyRunning,
    #[error("shutdown has already started")]
    ShuttingDown,
}

/// Read-only view of the running flag. Only [`LifecycleController`] can
/// clear it, and once cleared it stays cleared.
#[derive(Debug, Clone)]
pub struct RunFlag(CancellationToken);

impl RunFlag {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self(token)
    }

    pub fn is_running(&self) -> bool {
        !self.0.is_cancelled()
    }

    /// Resolves once the flag has been cleared.
    pub async fn stopped(&self) {
        self.0.cancelled().await
    }
}

/// Shutdown requests posted by signal handlers and the quit command.
///
/// Posting a request does no cleanup itself; the controller acts on it from
/// the main task.
#[derive(Debug, Clone, Default)]
pub struct ShutdownRequest(CancellationToken);

impl ShutdownRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.0.is_cancelled()
    }

    pub async fn requested(&self) {
        self.0.cancelled().await
    }
}

/// Owns the running flag and the poll task, and performs shutdown once.
pub struct LifecycleController {
    runtime: Handle,
    probe: Arc<dyn StatusProbe>,
    running: CancellationToken,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    poll_exited: CancellationToken,
    shutdown_started: AtomicBool,
    shutdown_complete: CancellationToken,
}

impl LifecycleController {
    pub fn new(runtime: Handle, probe: Arc<dyn StatusProbe>) -> Self {
        Self {
            runtime,
            probe,
            running: CancellationToken::new(),
            poll_task: Mutex::new(None),
            poll_exited: CancellationToken::new(),
            shutdown_started: AtomicBool::new(false),
            shutdown_complete: CancellationToken::new(),
        }
    }

    pub fn run_flag(&self) -> RunFlag {
        RunFlag::new(self.running.clone())
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn is_running(&self) -> bool {
        !self.running.is_cancelled()
    }

    #[cfg(test)]
    pub async fn has_poll_task(&self) -> bool {
        self.poll_task.lock().await.is_some()
    }

    pub async fn start(&self, poll: PollLoop) -> Result<(), LifecycleError> {
        let mut slot = self.poll_task.lock().await;
        if !self.is_running() {
            return Err(LifecycleError::ShuttingDown);
        }
        if slot.is_some() {
            return Err(LifecycleError::AlreadyRunning);
        }

        let exited = self.poll_exited.clone();
        *slot = Some(self.runtime.spawn(async move {
            // Fires on normal return and on panic unwind alike.
            let _exited = exited.drop_guard();
            poll.run().await;
        }));
        tracing::debug!("Poll task spawned");
        Ok(())
    }

    /// Waits until shutdown is requested or the poll task ends by itself.
    pub async fn wait(&self, requests: &ShutdownRequest) {
        tokio::select! {
            _ = requests.requested() => {
                tracing::info!("Application shutdown requested");
            }
            _ = self.poll_exited.cancelled() => {
                if self.is_running() {
                    tracing::warn!("Poll loop exited before shutdown was requested");
                }
            }
        }
    }

    /// Stops the poll loop and closes the probe.
    ///
    /// Only the first call does the work and returns `true`; later calls wait
    /// for that first shutdown to finish and return `false`. The probe is
    /// closed after the poll task has fully stopped, so an in-flight probe
    /// always completes first. A probe in flight is not preempted: the wait
    /// is bounded by the probe's own request timeout.
    pub async fn shutdown(&self) -> bool {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shutdown already in progress");
            self.shutdown_complete.cancelled().await;
            return false;
        }

        tracing::info!("Starting application cleanup...");
        self.running.cancel();

        let task = self.poll_task.lock().await.take();
        if let Some(task) = task {
            match task.await {
                Ok(()) => tracing::debug!("Poll task stopped"),
                Err(e) if e.is_cancelled() => tracing::debug!("Poll task cancelled"),
                Err(e) => tracing::error!(error = %e, "Poll task ended abnormally"),
            }
        }

        self.probe.close().await;
        tracing::info!("Application cleanup completed");
        self.shutdown_complete.cancel();
        true
    }
}
