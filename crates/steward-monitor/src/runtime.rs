//! Container runtime abstraction.
//!
//! The controller never creates processes itself. It drives an external
//! runtime through these traits: namespaces and containers are listed
//! through [`RuntimeClient`], container metadata is read and written
//! through [`Container`], and the live process backing a container is
//! controlled through [`Task`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::sys::signal::Signal;
use steward_common::config::ContainerConfig;
use steward_common::error::Result;
use steward_common::types::{ContainerId, Namespace, TaskStatus};
use tokio::sync::oneshot;

use crate::translate::ExecutionSpec;

/// Exit information reported by the runtime when a task's process ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Process exit code.
    pub code: u32,
    /// When the process exited.
    pub exited_at: DateTime<Utc>,
}

impl ExitStatus {
    /// Creates an exit status stamped with the current time.
    #[must_use]
    pub fn now(code: u32) -> Self {
        Self {
            code,
            exited_at: Utc::now(),
        }
    }
}

/// Resolves once the task's process has exited.
///
/// Obtain it with [`Task::wait`] *before* signalling the task so that an
/// exit racing the signal is not missed.
pub type ExitWaiter = oneshot::Receiver<ExitStatus>;

/// How standard I/O is wired when a task is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskIo {
    /// Load the task without touching its I/O.
    Null,
    /// Re-attach the controller's stdio to the task's existing streams.
    Stdio,
}

/// A set of label writes and removals applied atomically to a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelMutation {
    /// Labels to set, overwriting existing values.
    pub set: Vec<(String, String)>,
    /// Labels to remove.
    pub remove: Vec<String>,
}

impl LabelMutation {
    /// Creates an empty mutation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a label write.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set.push((key.into(), value.into()));
        self
    }

    /// Adds a label removal.
    #[must_use]
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.remove.push(key.into());
        self
    }

    /// Applies the mutation to a label map.
    pub fn apply_to(&self, labels: &mut HashMap<String, String>) {
        for key in &self.remove {
            let _ = labels.remove(key);
        }
        for (key, value) in &self.set {
            let _ = labels.insert(key.clone(), value.clone());
        }
    }
}

/// Entry point into the container runtime.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Lists every namespace known to the runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be reached.
    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;

    /// Lists the containers in `namespace` that carry the label `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot list the namespace.
    async fn list_containers(
        &self,
        namespace: &Namespace,
        label: &str,
    ) -> Result<Vec<Arc<dyn Container>>>;
}

/// A container record held by the runtime.
#[async_trait]
pub trait Container: Send + Sync {
    /// Container identifier.
    fn id(&self) -> &ContainerId;

    /// Namespace the container belongs to.
    fn namespace(&self) -> &Namespace;

    /// Reads the container's current labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    async fn labels(&self) -> Result<HashMap<String, String>>;

    /// Reads a single label.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read.
    async fn read_label(&self, key: &str) -> Result<Option<String>> {
        Ok(self.labels().await?.remove(key))
    }

    /// Applies a label mutation to the container record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be updated.
    async fn update(&self, mutation: &LabelMutation) -> Result<()>;

    /// Reads the declarative configuration stored with the container.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is missing or malformed.
    async fn config(&self) -> Result<ContainerConfig>;

    /// Loads the container's task.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the container has no task.
    async fn task(&self, io: TaskIo) -> Result<Arc<dyn Task>>;

    /// Creates a task from an execution spec without starting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime rejects the spec or a task exists.
    async fn new_task(&self, spec: &ExecutionSpec) -> Result<Arc<dyn Task>>;

    /// Permanently removes the container record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be removed.
    async fn delete(&self) -> Result<()>;
}

/// The live process backing a container.
#[async_trait]
pub trait Task: Send + Sync {
    /// Task identifier.
    fn id(&self) -> &str;

    /// PID of the task's init process.
    fn pid(&self) -> u32;

    /// Reads the task's process state.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot report the state.
    async fn status(&self) -> Result<TaskStatus>;

    /// Starts a created or exited task.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    async fn start(&self) -> Result<()>;

    /// Delivers a signal to the task's init process.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if the process has already exited.
    async fn kill(&self, signal: Signal) -> Result<()>;

    /// Returns a receiver resolving when the process exits.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot subscribe to the exit.
    async fn wait(&self) -> Result<ExitWaiter>;

    /// Deletes an exited task.
    ///
    /// # Errors
    ///
    /// Returns an error if the task is still running or cannot be removed.
    async fn delete(&self) -> Result<()>;
}
