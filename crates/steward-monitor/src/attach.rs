//! Re-attachment to tasks that outlived a previous controller process.

use steward_common::constants::STATUS_LABEL;
use steward_common::error::Result;
use steward_common::types::Namespace;

use crate::runtime::{RuntimeClient, TaskIo};

/// Re-attaches stdio to every existing managed task, in every namespace.
///
/// No process is started. Containers without a task are skipped silently.
/// Returns the number of tasks attached.
///
/// # Errors
///
/// Returns an error if namespaces cannot be listed. Failures within a
/// namespace are logged and skipped.
pub async fn attach(runtime: &dyn RuntimeClient) -> Result<usize> {
    let namespaces = runtime.list_namespaces().await?;
    let mut attached = 0;
    for namespace in &namespaces {
        match attach_namespace(runtime, namespace).await {
            Ok(count) => attached += count,
            Err(err) => tracing::error!(namespace = %namespace, error = %err, "attach tasks"),
        }
    }
    Ok(attached)
}

async fn attach_namespace(runtime: &dyn RuntimeClient, namespace: &Namespace) -> Result<usize> {
    let containers = runtime.list_containers(namespace, STATUS_LABEL).await?;
    let mut attached = 0;
    for container in containers {
        match container.task(TaskIo::Stdio).await {
            Ok(task) => {
                attached += 1;
                tracing::info!(
                    namespace = %namespace,
                    id = %container.id(),
                    task = task.id(),
                    pid = task.pid(),
                    "attach task"
                );
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                tracing::error!(namespace = %namespace, id = %container.id(), error = %err, "load task");
            }
        }
    }
    Ok(attached)
}
