//! Drift detection and application across every namespace.

use std::sync::Arc;

use steward_common::constants::STATUS_LABEL;
use steward_common::error::Result;
use steward_common::types::Namespace;

use crate::backends::Backends;
use crate::change::Change;
use crate::runtime::{Container, RuntimeClient};
use crate::status;

/// Totals for one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Namespaces whose containers were listed.
    pub namespaces: usize,
    /// Changes computed.
    pub changes: usize,
    /// Changes that applied without error.
    pub applied: usize,
    /// Changes that failed and will be recomputed next pass.
    pub failed: usize,
}

/// Computes and applies changes against a runtime.
pub struct Reconciler<'a> {
    runtime: &'a dyn RuntimeClient,
    backends: &'a Backends,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler over `runtime` using `backends` to apply changes.
    #[must_use]
    pub fn new(runtime: &'a dyn RuntimeClient, backends: &'a Backends) -> Self {
        Self { runtime, backends }
    }

    /// Runs one pass: each namespace's changes are computed and applied
    /// before the next namespace is listed.
    ///
    /// # Errors
    ///
    /// Returns an error only if namespaces cannot be listed. Failures inside
    /// a namespace are logged and retried by the next pass.
    pub async fn reconcile(&self) -> Result<PassSummary> {
        let namespaces = self.runtime.list_namespaces().await?;
        let mut summary = PassSummary::default();
        for namespace in &namespaces {
            let changes = match self.changes(namespace).await {
                Ok(changes) => changes,
                Err(err) => {
                    tracing::error!(namespace = %namespace, error = %err, "get changes");
                    continue;
                }
            };
            summary.namespaces += 1;
            summary.changes += changes.len();
            for change in &changes {
                if self.apply(change).await {
                    summary.applied += 1;
                } else {
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }

    /// Lists the managed containers of `namespace` and returns one change
    /// per container whose actual status differs from its desired status,
    /// in listing order.
    ///
    /// # Errors
    ///
    /// Returns an error if the namespace's containers cannot be listed. A
    /// container whose labels or task cannot be read is logged and skipped.
    pub async fn changes(&self, namespace: &Namespace) -> Result<Vec<Change>> {
        let containers = self.runtime.list_containers(namespace, STATUS_LABEL).await?;
        let mut changes = Vec::new();
        for container in containers {
            if let Some(change) = Self::change_for(namespace, container).await {
                changes.push(change);
            }
        }
        Ok(changes)
    }

    async fn change_for(namespace: &Namespace, container: Arc<dyn Container>) -> Option<Change> {
        let id = container.id().clone();
        let labels = match container.labels().await {
            Ok(labels) => labels,
            Err(err) => {
                tracing::error!(namespace = %namespace, id = %id, error = %err, "fetch labels");
                return None;
            }
        };
        let Some(desired) = status::desired_status(&labels) else {
            tracing::trace!(namespace = %namespace, id = %id, "unmanaged status value");
            return None;
        };
        let actual = match status::actual_status(container.as_ref(), &labels).await {
            Ok(actual) => actual,
            Err(err) => {
                tracing::error!(namespace = %namespace, id = %id, error = %err, "load task status");
                return None;
            }
        };
        if actual.satisfies(desired) {
            return None;
        }
        tracing::debug!(
            namespace = %namespace,
            id = %id,
            %desired,
            actual = %actual.task,
            registered = actual.registered,
            "status drift"
        );
        Some(Change::for_status(desired, container))
    }

    async fn apply(&self, change: &Change) -> bool {
        let container = change.container();
        match change.apply(self.backends).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    namespace = %container.namespace(),
                    id = %container.id(),
                    operation = change.operation(),
                    error = %err,
                    "apply change"
                );
                false
            }
        }
    }
}
