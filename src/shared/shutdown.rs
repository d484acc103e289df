//! Process stop handling
//!
//! A [`ShutdownSignal`] is a latched flag: once raised it stays raised, and
//! every waiter, early or late, observes it. [`ShutdownCoordinator`] ties the
//! flag to SIGTERM/SIGINT and gives an in-flight billing run a grace period
//! before the service lets go of the database.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

/// Cloneable stop flag shared by the scheduler and the service handle
#[derive(Clone)]
pub struct ShutdownSignal {
    raised: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (raised, _) = watch::channel(false);
        Self {
            raised: Arc::new(raised),
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.raised.borrow()
    }

    /// Raise the flag. Repeated calls are no-ops.
    pub fn trigger(&self) {
        if !self.raised.send_replace(true) {
            info!("Stop requested");
        }
    }

    /// Resolves once the flag is raised, immediately if it already is
    pub async fn wait(&self) {
        let mut rx = self.raised.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|raised| *raised).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Name of the first termination signal delivered to the process, or
/// `None` when the handlers could not be installed.
async fn next_termination_signal() -> Option<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate())
            .map_err(|e| error!(error = %e, "Cannot listen for SIGTERM"))
            .ok()?;
        let mut int = signal(SignalKind::interrupt())
            .map_err(|e| error!(error = %e, "Cannot listen for SIGINT"))
            .ok()?;

        tokio::select! {
            _ = term.recv() => Some("SIGTERM"),
            _ = int.recv() => Some("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => Some("Ctrl+C"),
            Err(e) => {
                error!(error = %e, "Cannot listen for Ctrl+C");
                None
            }
        }
    }
}

/// Owns the service's stop flag and the grace period for draining work
pub struct ShutdownCoordinator {
    signal: ShutdownSignal,
    grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(grace_secs: u64) -> Self {
        Self {
            signal: ShutdownSignal::new(),
            grace: Duration::from_secs(grace_secs),
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Raise the flag on the first SIGTERM or SIGINT
    pub fn start_signal_listener(&self) {
        let signal = self.signal.clone();
        tokio::spawn(async move {
            if let Some(name) = next_termination_signal().await {
                info!(signal = name, "Termination signal received");
                signal.trigger();
            }
        });
    }

    /// After the flag is raised, give `drain` the grace period to finish.
    /// Returns false when it was cut off.
    pub async fn shutdown_with_cleanup<F, Fut>(&self, drain: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.signal.wait().await;
        info!(grace_secs = self.grace.as_secs(), "Draining before exit");

        if tokio::time::timeout(self.grace, drain()).await.is_ok() {
            info!("Drained cleanly");
            true
        } else {
            warn!(grace_secs = self.grace.as_secs(), "Grace period elapsed with work still running");
            false
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(30)
    }
}
