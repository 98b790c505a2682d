//! Top-level orchestrator owning the reconcile loop and its shutdown.

use std::sync::Arc;

use steward_common::error::Result;
use steward_common::types::ContainerId;
use tokio::sync::{Mutex, watch};

use crate::attach;
use crate::backends::Backends;
use crate::reconcile::{PassSummary, Reconciler};
use crate::runtime::RuntimeClient;
use crate::shutdown::{self, ShutdownReport};

/// Lifecycle of a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// The reconcile loop is ticking.
    Running,
    /// A stop was requested; the loop shuts down when it next wakes.
    Stopping,
    /// Shutdown finished; the loop has exited or will on its next wake.
    Stopped,
}

/// Drives every managed container toward its desired status.
///
/// Construct one per process and share it by `Arc` between the reconcile
/// loop and whatever requests the stop. A single mutex serializes
/// reconcile passes against shutdown.
pub struct Monitor {
    runtime: Arc<dyn RuntimeClient>,
    backends: Backends,
    pass: Mutex<()>,
    state: watch::Sender<MonitorState>,
}

impl Monitor {
    /// Creates a monitor in the [`MonitorState::Running`] state.
    #[must_use]
    pub fn new(runtime: Arc<dyn RuntimeClient>, backends: Backends) -> Self {
        let (state, _) = watch::channel(MonitorState::Running);
        tracing::debug!(
            networks = ?backends.networks.types().collect::<Vec<_>>(),
            interval = ?backends.config.interval(),
            "monitor created"
        );
        Self {
            runtime,
            backends,
            pass: Mutex::new(()),
            state,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// The collaborators changes are applied with.
    pub const fn backends(&self) -> &Backends {
        &self.backends
    }

    /// Requests a stop. Returns immediately; the reconcile loop performs
    /// the shutdown when it next wakes. Repeated calls are ignored.
    pub fn stop(&self) {
        let requested = self.state.send_if_modified(|state| {
            if *state == MonitorState::Running {
                *state = MonitorState::Stopping;
                true
            } else {
                false
            }
        });
        if requested {
            tracing::info!("stop requested");
        }
    }

    /// Re-attaches to tasks that were running before this process started.
    ///
    /// Call once, before [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns an error if namespaces cannot be listed.
    pub async fn attach(&self) -> Result<usize> {
        attach::attach(self.runtime.as_ref()).await
    }

    /// Runs one reconcile pass while holding the pass lock.
    ///
    /// Once a stop has been requested no pass runs: the state is checked
    /// again after the lock is acquired, so a pass queued behind shutdown
    /// returns an empty summary instead of restarting stopped tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if namespaces cannot be listed.
    pub async fn reconcile(&self) -> Result<PassSummary> {
        let _pass = self.pass.lock().await;
        if self.state() != MonitorState::Running {
            tracing::debug!(state = ?self.state(), "skipping reconcile pass after stop");
            return Ok(PassSummary::default());
        }
        Reconciler::new(self.runtime.as_ref(), &self.backends)
            .reconcile()
            .await
    }

    /// Terminates every managed task and marks the monitor stopped.
    ///
    /// Waits for any in-flight reconcile pass first. Runs at most once;
    /// later calls return an empty report.
    pub async fn shutdown(&self) -> ShutdownReport {
        let _pass = self.pass.lock().await;
        if self.state() == MonitorState::Stopped {
            return ShutdownReport::default();
        }
        let config = &self.backends.config;
        let report = shutdown::shutdown(
            self.runtime.as_ref(),
            config.shutdown_timeout(),
            config.kill_on_timeout,
        )
        .await;
        let _ = self.state.send_replace(MonitorState::Stopped);
        report
    }

    /// Runs the reconcile loop until a stop is requested, then shuts down.
    ///
    /// Each iteration sleeps for the configured interval (waking early on
    /// a stop request), then either shuts down and returns or performs one
    /// reconcile pass.
    pub async fn run(&self) {
        let interval = self.backends.config.interval();
        let mut stop_requested = self.state.subscribe();
        loop {
            if self.state() == MonitorState::Running {
                tokio::select! {
                    () = tokio::time::sleep(interval) => {}
                    _ = stop_requested.changed() => {}
                }
            }

            if self.state() != MonitorState::Running {
                tracing::debug!("ending reconcile loop for shutdown");
                let _ = self.shutdown().await;
                return;
            }

            match self.reconcile().await {
                Ok(summary) if summary.changes > 0 => {
                    tracing::info!(
                        changes = summary.changes,
                        applied = summary.applied,
                        failed = summary.failed,
                        "reconcile pass"
                    );
                }
                Ok(_) => tracing::trace!("reconcile pass found no drift"),
                Err(err) => tracing::error!(error = %err, "reconcile"),
            }
        }
    }

    /// Resolves once shutdown has completed.
    pub async fn wait_stopped(&self) {
        let mut state = self.state.subscribe();
        let _ = state
            .wait_for(|state| *state == MonitorState::Stopped)
            .await;
    }

    /// Attaches, wires SIGINT/SIGTERM to [`stop`](Self::stop), and runs the
    /// reconcile loop until shutdown completes.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial attach cannot list namespaces.
    pub async fn serve(self: Arc<Self>) -> Result<()> {
        let attached = self.attach().await?;
        tracing::info!(attached, "attached to existing tasks");
        let signals = tokio::spawn(crate::signal::stop_on_signal(Arc::clone(&self)));
        self.run().await;
        signals.abort();
        Ok(())
    }

    /// Puts a container's services into maintenance.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry rejects the request.
    pub async fn enable_maintenance(&self, id: &ContainerId, message: &str) -> Result<()> {
        self.backends.registry.enable_maintenance(id, message).await?;
        tracing::info!(id = %id, reason = message, "maintenance enabled");
        Ok(())
    }

    /// Takes a container's services out of maintenance.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry rejects the request.
    pub async fn disable_maintenance(&self, id: &ContainerId) -> Result<()> {
        self.backends.registry.disable_maintenance(id).await?;
        tracing::info!(id = %id, "maintenance disabled");
        Ok(())
    }
}
