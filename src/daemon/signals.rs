use crate::daemon::lifecycle::ShutdownRequest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Whether an interrupt currently counts as a shutdown request.
///
/// While an [`InterruptGuard`] is alive, SIGINT is ignored; terminate still
/// shuts down.
#[derive(Debug, Clone, Default)]
pub struct SignalMode {
    suppressed: Arc<AtomicUsize>,
}

impl SignalMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn suppress_interrupt(&self) -> InterruptGuard {
        self.suppressed.fetch_add(1, Ordering::SeqCst);
        InterruptGuard {
            suppressed: Arc::clone(&self.suppressed),
        }
    }

    pub fn interrupt_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::SeqCst) > 0
    }
}

/// Restores normal interrupt handling when dropped.
#[must_use = "interrupts are only suppressed while the guard is held"]
pub struct InterruptGuard {
    suppressed: Arc<AtomicUsize>,
}

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.suppressed.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Installed OS signal streams. Delivery only posts a [`ShutdownRequest`].
pub struct SignalListener {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    mode: SignalMode,
}

impl SignalListener {
    /// Registers the handlers. Must be called from within the runtime.
    pub fn install(mode: SignalMode) -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                sigint: signal(SignalKind::interrupt())?,
                sigterm: signal(SignalKind::terminate())?,
                mode,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self { mode })
        }
    }

    pub fn spawn(self, runtime: &Handle, requests: ShutdownRequest) -> JoinHandle<()> {
        runtime.spawn(self.listen(requests))
    }

    async fn listen(mut self, requests: ShutdownRequest) {
        match self.next_shutdown_signal(&requests).await {
            Some(signal) => {
                println!("\nPlease wait a moment, terminating the application...");
                tracing::info!(signal, "Shutdown signal received");
                requests.request();
            }
            None => {
                tracing::debug!("Signal listener stopped: shutdown already requested");
            }
        }
    }

    #[cfg(unix)]
    async fn next_shutdown_signal(&mut self, requests: &ShutdownRequest) -> Option<&'static str> {
        loop {
            tokio::select! {
                _ = requests.requested() => return None,
                _ = self.sigterm.recv() => return Some("SIGTERM"),
                _ = self.sigint.recv() => {
                    // Checked when the listener wakes, not at delivery. An
                    // interrupt just before the prompt returns can still count.
                    if self.mode.interrupt_suppressed() {
                        tracing::debug!("Ignoring SIGINT while reading input");
                        continue;
                    }
                    return Some("SIGINT");
                }
            }
        }
    }

    #[cfg(not(unix))]
    async fn next_shutdown_signal(&mut self, requests: &ShutdownRequest) -> Option<&'static str> {
        loop {
            tokio::select! {
                _ = requests.requested() => return None,
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                        return None;
                    }
                    if self.mode.interrupt_suppressed() {
                        tracing::debug!("Ignoring Ctrl-C while reading input");
                        continue;
                    }
                    return Some("Ctrl-C");
                }
            }
        }
    }
}
