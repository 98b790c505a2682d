//! Configuration models: the controller's own settings and the
//! declarative per-container specification stored with each container.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Result, StewardError};
use crate::types::{ContainerId, NetworkType};

/// Settings for the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Root directory for per-container on-disk state.
    pub root: PathBuf,
    /// Seconds between reconcile passes; `0` selects the default.
    pub interval_secs: u64,
    /// Seconds a Stop or Delete waits for its task to exit.
    pub stop_grace_secs: u64,
    /// Seconds each shutdown unit waits for its task to exit.
    pub shutdown_timeout_secs: u64,
    /// Send SIGKILL to tasks that outlive their graceful deadline.
    pub kill_on_timeout: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(constants::DEFAULT_ROOT),
            interval_secs: constants::DEFAULT_INTERVAL_SECS,
            stop_grace_secs: constants::DEFAULT_STOP_GRACE_SECS,
            shutdown_timeout_secs: constants::DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            kill_on_timeout: false,
        }
    }
}

impl MonitorConfig {
    /// Parses a configuration from JSON, filling omitted fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not valid JSON for this model.
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Reads and parses a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StewardError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    /// Time between reconcile passes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        if self.interval_secs == 0 {
            Duration::from_secs(constants::DEFAULT_INTERVAL_SECS)
        } else {
            Duration::from_secs(self.interval_secs)
        }
    }

    /// Grace period for Stop and Delete.
    #[must_use]
    pub const fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    /// Per-unit deadline during shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Directory holding on-disk state for one container.
    #[must_use]
    pub fn container_dir(&self, id: &ContainerId) -> PathBuf {
        self.root.join(id.as_str())
    }
}

/// Declarative specification of one container, stored with the container
/// record by whoever created it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Container identifier.
    pub id: String,
    /// Image reference.
    pub image: String,
    /// Resource limits.
    pub resources: Option<Resources>,
    /// GPU attachment.
    pub gpus: Option<Gpus>,
    /// Additional mounts.
    pub mounts: Vec<Mount>,
    /// Environment in `KEY=value` form.
    pub env: Vec<String>,
    /// Arguments overriding the image's entrypoint arguments.
    pub args: Vec<String>,
    /// Container labels in `key=value` form.
    pub labels: Vec<String>,
    /// Network attachment type.
    pub network: NetworkType,
    /// Services exposed by the container, keyed by service name.
    pub services: BTreeMap<String, Service>,
}

impl ContainerConfig {
    /// Parses `labels` into a map. Entries without `=` map to an empty value.
    #[must_use]
    pub fn label_map(&self) -> HashMap<String, String> {
        self.labels
            .iter()
            .map(|label| match label.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (label.clone(), String::new()),
            })
            .collect()
    }
}

/// A service endpoint announced to the registry while the container runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    /// Port the service listens on.
    pub port: u16,
    /// Registry tags.
    pub labels: Vec<String>,
    /// Health checks.
    pub checks: Vec<Check>,
}

/// Health check protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// HTTP GET returning a 2xx status.
    Http,
    /// TCP connect.
    Tcp,
    /// gRPC health protocol.
    Grpc,
}

/// A registry health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    /// Check protocol.
    #[serde(rename = "type")]
    pub kind: CheckType,
    /// Seconds between checks.
    #[serde(default)]
    pub interval: u64,
    /// Seconds before a check is considered failed.
    #[serde(default)]
    pub timeout: u64,
}

/// Resource limits for a container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// CPU count; fractional values are allowed.
    pub cpu: f64,
    /// Memory limit in MiB.
    pub memory: i64,
    /// OOM score adjustment.
    pub score: i32,
}

/// GPU devices and driver capabilities exposed to the container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Gpus {
    /// Device indexes.
    pub devices: Vec<u32>,
    /// Driver capabilities, e.g. `compute` or `utility`.
    pub capabilities: Vec<String>,
}

/// A filesystem mount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mount {
    /// Mount type, e.g. `bind`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source path on the host.
    pub source: String,
    /// Destination inside the container.
    pub destination: String,
    /// Mount options.
    pub options: Vec<String>,
}
