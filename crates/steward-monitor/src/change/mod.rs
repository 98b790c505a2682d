//! Transitions computed by a reconcile pass.
//!
//! Each [`Change`] targets one container and carries everything needed to
//! drive it to its desired status. Every step is safe to repeat: a failed
//! apply is simply recomputed and retried on the next pass.

mod delete;
mod start;
mod stop;

use std::fmt;
use std::sync::Arc;

use steward_common::error::Result;
use steward_common::types::DesiredStatus;

use crate::backends::Backends;
use crate::runtime::Container;

/// One container's required transition.
#[derive(Clone)]
pub enum Change {
    /// Ensure a task exists, runs, has its network, and is registered.
    Start(Arc<dyn Container>),
    /// Terminate the task and deregister, keeping the container record.
    Stop(Arc<dyn Container>),
    /// Terminate, detach, deregister, and remove the container for good.
    Delete(Arc<dyn Container>),
}

impl Change {
    /// Builds the change that drives `container` toward `desired`.
    #[must_use]
    pub fn for_status(desired: DesiredStatus, container: Arc<dyn Container>) -> Self {
        match desired {
            DesiredStatus::Running => Self::Start(container),
            DesiredStatus::Stopped => Self::Stop(container),
            DesiredStatus::Delete => Self::Delete(container),
        }
    }

    /// The container this change targets.
    #[must_use]
    pub fn container(&self) -> &Arc<dyn Container> {
        match self {
            Self::Start(c) | Self::Stop(c) | Self::Delete(c) => c,
        }
    }

    /// Short operation name for logs.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Start(_) => "start",
            Self::Stop(_) => "stop",
            Self::Delete(_) => "delete",
        }
    }

    /// Applies the change.
    ///
    /// # Errors
    ///
    /// Returns the first failing step; earlier steps are not rolled back.
    pub async fn apply(&self, backends: &Backends) -> Result<()> {
        match self {
            Self::Start(c) => start::apply(c.as_ref(), backends).await,
            Self::Stop(c) => stop::apply(c.as_ref(), backends).await,
            Self::Delete(c) => delete::apply(c.as_ref(), backends).await,
        }
    }
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let container = self.container();
        f.debug_struct("Change")
            .field("operation", &self.operation())
            .field("namespace", container.namespace())
            .field("id", container.id())
            .finish()
    }
}
