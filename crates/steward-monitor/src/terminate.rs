//! Graceful task termination shared by Stop, Delete, and shutdown.

use std::time::Duration;

use nix::sys::signal::Signal;
use steward_common::error::{Result, StewardError};
use steward_common::types::{ContainerId, TaskStatus};

use crate::runtime::{ExitStatus, ExitWaiter, Task};

/// How a termination attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The task was not running; it was reaped without signalling.
    AlreadyStopped,
    /// The task exited after SIGTERM and was reaped.
    Exited(ExitStatus),
    /// The task ignored SIGTERM, exited after SIGKILL, and was reaped.
    Killed(ExitStatus),
    /// The task outlived the deadline and was left running.
    Abandoned,
}

impl Termination {
    /// Returns whether the task is gone.
    pub const fn is_reaped(self) -> bool {
        !matches!(self, Self::Abandoned)
    }
}

/// Sends SIGTERM to `task`, waits up to `deadline` for it to exit, and
/// deletes it once it has.
///
/// With `kill_on_timeout` a task that outlives the deadline receives
/// SIGKILL and is waited on for another `deadline`; otherwise it is
/// abandoned. A task that is not running is reaped directly.
///
/// # Errors
///
/// Returns an error if the runtime fails to report status, deliver a
/// signal, or delete the task, or if a killed task still does not exit.
pub async fn terminate(
    task: &dyn Task,
    id: &ContainerId,
    deadline: Duration,
    kill_on_timeout: bool,
) -> Result<Termination> {
    let status = task.status().await?;
    if matches!(status, TaskStatus::Stopped | TaskStatus::Created) {
        reap(task).await?;
        tracing::debug!(id = %id, %status, "reaped task that was not running");
        return Ok(Termination::AlreadyStopped);
    }

    let waiter = task.wait().await?;
    signal(task, Signal::SIGTERM).await?;
    tracing::debug!(id = %id, pid = task.pid(), "sent SIGTERM");
    if let Some(exit) = wait_exit(waiter, id, deadline).await? {
        reap(task).await?;
        return Ok(Termination::Exited(exit));
    }

    if !kill_on_timeout {
        tracing::warn!(id = %id, pid = task.pid(), ?deadline, "task did not exit, abandoning");
        return Ok(Termination::Abandoned);
    }

    let waiter = task.wait().await?;
    signal(task, Signal::SIGKILL).await?;
    tracing::warn!(id = %id, pid = task.pid(), "sent SIGKILL");
    match wait_exit(waiter, id, deadline).await? {
        Some(exit) => {
            reap(task).await?;
            Ok(Termination::Killed(exit))
        }
        None => Err(StewardError::Timeout {
            operation: "kill",
            id: id.to_string(),
            after: deadline,
        }),
    }
}

/// Delivers `signal`, treating an already-exited process as delivered.
async fn signal(task: &dyn Task, signal: Signal) -> Result<()> {
    match task.kill(signal).await {
        Err(err) if !err.is_not_found() => Err(err),
        _ => Ok(()),
    }
}

async fn wait_exit(
    waiter: ExitWaiter,
    id: &ContainerId,
    deadline: Duration,
) -> Result<Option<ExitStatus>> {
    match tokio::time::timeout(deadline, waiter).await {
        Ok(Ok(exit)) => Ok(Some(exit)),
        Ok(Err(_)) => Err(StewardError::backend(
            "wait",
            id.as_str(),
            "exit channel closed before the task exited",
        )),
        Err(_) => Ok(None),
    }
}

/// Deletes an exited task; a task that is already gone is not an error.
///
/// # Errors
///
/// Returns an error if the runtime fails to delete the task.
pub async fn reap(task: &dyn Task) -> Result<()> {
    match task.delete().await {
        Err(err) if !err.is_not_found() => Err(err),
        _ => Ok(()),
    }
}
