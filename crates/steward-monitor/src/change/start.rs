use std::sync::Arc;

use steward_common::config::ContainerConfig;
use steward_common::constants::{ADDRESS_LABEL, REGISTERED_LABEL};
use steward_common::error::Result;
use steward_common::types::TaskStatus;

use crate::backends::Backends;
use crate::runtime::{Container, LabelMutation, Task, TaskIo};

/// Order: create task, attach network, start process, register services.
///
/// The network is attached before the process starts so the address
/// exists when the process first runs. A task that already runs is never
/// started again, and a task that already has an address keeps it. A
/// recreated task releases the attachment its predecessor left behind
/// before a new one is created.
pub(super) async fn apply(container: &dyn Container, backends: &Backends) -> Result<()> {
    let id = container.id();
    let namespace = container.namespace();
    let config = container.config().await?;
    let labels = container.labels().await?;

    let (task, created) = match container.task(TaskIo::Null).await {
        Ok(task) => (task, false),
        Err(err) if err.is_not_found() => (create_task(container, &config, backends).await?, true),
        Err(err) => return Err(err),
    };

    let previous = labels.get(ADDRESS_LABEL).map(String::as_str);
    let address = match previous {
        Some(address) if !created => Some(address.to_string()),
        _ => attach_network(container, &config, task.as_ref(), previous, backends).await?,
    };

    if task.status().await? == TaskStatus::Running {
        tracing::debug!(namespace = %namespace, id = %id, "task already running");
    } else {
        task.start().await?;
        tracing::info!(namespace = %namespace, id = %id, pid = task.pid(), "task started");
    }

    match address {
        Some(address) => {
            for (name, service) in &config.services {
                backends
                    .registry
                    .register(id, name, &address, service)
                    .await?;
                tracing::info!(
                    namespace = %namespace,
                    id = %id,
                    service = %name,
                    address = %address,
                    port = service.port,
                    "service registered"
                );
            }
        }
        None if !config.services.is_empty() => {
            tracing::warn!(
                namespace = %namespace,
                id = %id,
                "container has no network address, services not registered"
            );
        }
        None => {}
    }

    container
        .update(&LabelMutation::new().set(REGISTERED_LABEL, "true"))
        .await
}

async fn create_task(
    container: &dyn Container,
    config: &ContainerConfig,
    backends: &Backends,
) -> Result<Arc<dyn Task>> {
    let spec = backends.translator.translate(container.id(), config)?;
    let task = container.new_task(&spec).await?;
    tracing::info!(
        namespace = %container.namespace(),
        id = %container.id(),
        task = task.id(),
        "task created"
    );
    Ok(task)
}

async fn attach_network(
    container: &dyn Container,
    config: &ContainerConfig,
    task: &dyn Task,
    previous: Option<&str>,
    backends: &Backends,
) -> Result<Option<String>> {
    let Some(provider) = backends.networks.provider(container.id(), config.network)? else {
        return Ok(None);
    };
    if let Some(previous) = previous {
        provider.remove(container).await?;
        container
            .update(&LabelMutation::new().remove(ADDRESS_LABEL))
            .await?;
        tracing::debug!(
            namespace = %container.namespace(),
            id = %container.id(),
            address = %previous,
            "stale network attachment removed"
        );
    }
    let address = provider.create(task).await?;
    container
        .update(&LabelMutation::new().set(ADDRESS_LABEL, address.as_str()))
        .await?;
    tracing::info!(
        namespace = %container.namespace(),
        id = %container.id(),
        network = %config.network,
        address = %address,
        "network attached"
    );
    Ok(Some(address))
}
