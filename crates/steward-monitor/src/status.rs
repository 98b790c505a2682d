//! Desired and actual status of managed containers.

use std::collections::HashMap;

use steward_common::constants::{REGISTERED_LABEL, STATUS_LABEL};
use steward_common::error::Result;
use steward_common::types::{DesiredStatus, TaskStatus};

use crate::runtime::{Container, LabelMutation, TaskIo};

/// Reads the desired status from a container's labels.
///
/// Returns `None` when the label is absent or holds an unrecognised value.
pub fn desired_status(labels: &HashMap<String, String>) -> Option<DesiredStatus> {
    labels
        .get(STATUS_LABEL)
        .and_then(|value| DesiredStatus::from_label(value))
}

/// Runtime-observed state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActualStatus {
    /// Task process state; a container without a task reads as `Stopped`.
    pub task: TaskStatus,
    /// Whether the registry holds the container's services.
    pub registered: bool,
}

impl ActualStatus {
    /// Returns whether this state already satisfies `desired`.
    pub fn satisfies(self, desired: DesiredStatus) -> bool {
        match desired {
            DesiredStatus::Running => self.task == TaskStatus::Running && self.registered,
            DesiredStatus::Stopped => {
                matches!(self.task, TaskStatus::Stopped | TaskStatus::Created) && !self.registered
            }
            DesiredStatus::Delete => false,
        }
    }
}

/// Observes a container's actual status.
///
/// # Errors
///
/// Returns an error if the task exists but cannot be loaded or queried.
/// A missing task is not an error.
pub async fn actual_status(
    container: &dyn Container,
    labels: &HashMap<String, String>,
) -> Result<ActualStatus> {
    let task = match container.task(TaskIo::Null).await {
        Ok(task) => task.status().await?,
        Err(err) if err.is_not_found() => TaskStatus::Stopped,
        Err(err) => return Err(err),
    };
    Ok(ActualStatus {
        task,
        registered: labels.contains_key(REGISTERED_LABEL),
    })
}

/// Records a new desired status on a container.
///
/// The next reconcile pass picks the change up; setting
/// [`DesiredStatus::Delete`] is how a container is scheduled for removal.
///
/// # Errors
///
/// Returns an error if the container record cannot be updated.
pub async fn set_desired_status(container: &dyn Container, status: DesiredStatus) -> Result<()> {
    container
        .update(&LabelMutation::new().set(STATUS_LABEL, status.as_label()))
        .await?;
    tracing::info!(
        namespace = %container.namespace(),
        id = %container.id(),
        %status,
        "desired status updated"
    );
    Ok(())
}
