//! Process signal wiring.

use std::sync::Arc;

use tokio::signal::unix::{SignalKind, signal};

use crate::monitor::Monitor;

/// Waits for SIGINT or SIGTERM and requests a stop of `monitor`.
///
/// If the SIGTERM handler cannot be installed, only SIGINT stops the monitor.
pub async fn stop_on_signal(monitor: Arc<Monitor>) {
    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!(signal = "SIGINT", "received signal"),
                _ = terminate.recv() => tracing::info!(signal = "SIGTERM", "received signal"),
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "install SIGTERM handler");
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "install SIGINT handler");
                return;
            }
            tracing::info!(signal = "SIGINT", "received signal");
        }
    }
    monitor.stop();
}
