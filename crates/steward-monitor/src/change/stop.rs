use steward_common::constants::REGISTERED_LABEL;
use steward_common::error::{Result, StewardError};

use crate::backends::Backends;
use crate::runtime::{Container, LabelMutation, TaskIo};
use crate::terminate::{self, Termination};

/// Terminates and reaps the task, then deregisters on a best-effort basis.
///
/// The container record and its network attachment are kept.
pub(super) async fn apply(container: &dyn Container, backends: &Backends) -> Result<()> {
    let id = container.id();
    let namespace = container.namespace();

    stop_task(container, backends).await?;

    if container.read_label(REGISTERED_LABEL).await?.is_none() {
        return Ok(());
    }
    match backends.registry.deregister(id).await {
        Ok(()) => {
            container
                .update(&LabelMutation::new().remove(REGISTERED_LABEL))
                .await?;
            tracing::info!(namespace = %namespace, id = %id, "service deregistered");
        }
        Err(err) => {
            tracing::warn!(
                namespace = %namespace,
                id = %id,
                operation = "deregister",
                error = %err,
                "deregistration failed, will retry"
            );
        }
    }
    Ok(())
}

/// Runs the graceful termination sequence on the container's task, if any.
///
/// # Errors
///
/// Returns [`StewardError::Timeout`] when the task is left running.
pub(super) async fn stop_task(container: &dyn Container, backends: &Backends) -> Result<()> {
    let id = container.id();
    let task = match container.task(TaskIo::Null).await {
        Ok(task) => task,
        Err(err) if err.is_not_found() => return Ok(()),
        Err(err) => return Err(err),
    };

    let grace = backends.config.stop_grace();
    let outcome =
        terminate::terminate(task.as_ref(), id, grace, backends.config.kill_on_timeout).await?;
    match outcome {
        Termination::Abandoned => Err(StewardError::Timeout {
            operation: "stop",
            id: id.to_string(),
            after: grace,
        }),
        Termination::Exited(exit) | Termination::Killed(exit) => {
            tracing::info!(
                namespace = %container.namespace(),
                id = %id,
                exit_code = exit.code,
                "task stopped"
            );
            Ok(())
        }
        Termination::AlreadyStopped => Ok(()),
    }
}
