//! Concurrent, deadline-bounded termination of every managed task.

use std::sync::Arc;
use std::time::Duration;

use steward_common::constants::STATUS_LABEL;
use steward_common::error::Result;
use steward_common::types::{ContainerId, Namespace, TaskStatus};
use tokio::task::JoinSet;

use crate::runtime::{RuntimeClient, Task, TaskIo};
use crate::terminate::{self, Termination};

/// Outcome counts of a shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tasks that exited and were reaped.
    pub reaped: usize,
    /// Tasks left running after their deadline.
    pub abandoned: usize,
    /// Tasks whose termination failed.
    pub failed: usize,
}

struct Unit {
    namespace: Namespace,
    id: ContainerId,
    task: Arc<dyn Task>,
}

/// Terminates every running managed task across all namespaces.
///
/// One unit of work is spawned per task. Each sends SIGTERM and waits at
/// most `deadline` for the exit, reaping the task if it exits. Units run
/// concurrently, so a task that never exits delays nobody but itself.
/// Returns once every unit has finished. Listing failures are logged and
/// skip the affected namespace.
pub async fn shutdown(
    runtime: &dyn RuntimeClient,
    deadline: Duration,
    kill_on_timeout: bool,
) -> ShutdownReport {
    let mut units = JoinSet::new();
    match runtime.list_namespaces().await {
        Ok(namespaces) => {
            for namespace in namespaces {
                match running_tasks(runtime, &namespace).await {
                    Ok(tasks) => {
                        for unit in tasks {
                            let _ = units.spawn(stop_unit(unit, deadline, kill_on_timeout));
                        }
                    }
                    Err(err) => {
                        tracing::error!(namespace = %namespace, error = %err, "list containers for shutdown");
                    }
                }
            }
        }
        Err(err) => tracing::error!(error = %err, "list namespaces for shutdown"),
    }

    let mut report = ShutdownReport::default();
    while let Some(joined) = units.join_next().await {
        match joined {
            Ok(Ok(termination)) if termination.is_reaped() => report.reaped += 1,
            Ok(Ok(_)) => report.abandoned += 1,
            Ok(Err(())) => report.failed += 1,
            Err(err) => {
                tracing::error!(error = %err, "shutdown unit panicked");
                report.failed += 1;
            }
        }
    }
    tracing::info!(
        reaped = report.reaped,
        abandoned = report.abandoned,
        failed = report.failed,
        "shutdown complete"
    );
    report
}

async fn running_tasks(runtime: &dyn RuntimeClient, namespace: &Namespace) -> Result<Vec<Unit>> {
    let containers = runtime.list_containers(namespace, STATUS_LABEL).await?;
    let mut units = Vec::with_capacity(containers.len());
    for container in containers {
        let id = container.id().clone();
        let task = match container.task(TaskIo::Null).await {
            Ok(task) => task,
            Err(err) if err.is_not_found() => continue,
            Err(err) => {
                tracing::error!(namespace = %namespace, id = %id, error = %err, "load task");
                continue;
            }
        };
        match task.status().await {
            Ok(TaskStatus::Running) => units.push(Unit {
                namespace: namespace.clone(),
                id,
                task,
            }),
            Ok(_) => {}
            Err(err) => {
                tracing::error!(namespace = %namespace, id = %id, error = %err, "task status");
            }
        }
    }
    Ok(units)
}

async fn stop_unit(
    unit: Unit,
    deadline: Duration,
    kill_on_timeout: bool,
) -> std::result::Result<Termination, ()> {
    let Unit {
        namespace,
        id,
        task,
    } = unit;
    match terminate::terminate(task.as_ref(), &id, deadline, kill_on_timeout).await {
        Ok(termination) => {
            tracing::info!(namespace = %namespace, id = %id, ?termination, "task shut down");
            Ok(termination)
        }
        Err(err) => {
            tracing::error!(namespace = %namespace, id = %id, operation = "shutdown", error = %err, "stop task");
            Err(())
        }
    }
}
