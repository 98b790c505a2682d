use std::io::ErrorKind;

use steward_common::error::{Result, StewardError};

use crate::backends::Backends;
use crate::runtime::Container;

use super::stop;

/// Terminates the task, removes the network attachment, deregisters,
/// removes per-container state on disk, and deletes the container record.
///
/// Each step tolerates its target being gone already, so a delete that
/// failed halfway completes on the next pass. A container whose stored
/// configuration cannot be read is still torn down; only its network
/// removal is skipped, since the provider cannot be resolved.
pub(super) async fn apply(container: &dyn Container, backends: &Backends) -> Result<()> {
    let id = container.id();
    let namespace = container.namespace();

    stop::stop_task(container, backends).await?;

    match container.config().await {
        Ok(config) => {
            if let Some(provider) = backends.networks.provider(id, config.network)? {
                provider.remove(container).await?;
                tracing::debug!(namespace = %namespace, id = %id, network = %config.network, "network removed");
            }
        }
        Err(err) => {
            tracing::warn!(
                namespace = %namespace,
                id = %id,
                operation = "delete",
                error = %err,
                "container configuration unreadable, skipping network removal"
            );
        }
    }

    backends.registry.deregister(id).await?;

    let dir = backends.config.container_dir(id);
    match std::fs::remove_dir_all(&dir) {
        Err(err) if err.kind() != ErrorKind::NotFound => {
            return Err(StewardError::Io {
                path: dir,
                source: err,
            });
        }
        _ => {}
    }

    match container.delete().await {
        Err(err) if !err.is_not_found() => return Err(err),
        _ => {}
    }
    tracing::info!(namespace = %namespace, id = %id, "container deleted");
    Ok(())
}
