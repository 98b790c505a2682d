//! Translation of declarative container configuration into the runtime's
//! execution spec.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use steward_common::config::{ContainerConfig, MonitorConfig, Mount, Resources};
use steward_common::constants;
use steward_common::error::{Result, StewardError};
use steward_common::types::{ContainerId, NetworkType};

/// Everything the runtime needs to create a task's process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSpec {
    /// Image reference.
    pub image: String,
    /// Process arguments; empty keeps the image's defaults.
    pub args: Vec<String>,
    /// Environment in `KEY=value` form.
    pub env: Vec<String>,
    /// Hostname inside the container.
    pub hostname: String,
    /// Mounts, including generated hosts and resolver files.
    pub mounts: Vec<Mount>,
    /// Container labels.
    pub labels: HashMap<String, String>,
    /// Memory limit in bytes.
    pub memory_limit: Option<i64>,
    /// CPU quota in microseconds per period.
    pub cpu_quota: Option<i64>,
    /// CPU period in microseconds.
    pub cpu_period: Option<u64>,
    /// OOM score adjustment.
    pub oom_score_adj: Option<i32>,
    /// Join the host's network namespace.
    pub host_network: bool,
    /// Set `no_new_privs` on the process.
    pub no_new_privileges: bool,
    /// AppArmor profile name.
    pub apparmor_profile: Option<String>,
    /// Apply the runtime's default seccomp profile.
    pub default_seccomp: bool,
    /// GPU device indexes.
    pub gpu_devices: Vec<u32>,
    /// GPU driver capabilities.
    pub gpu_capabilities: Vec<String>,
}

/// Turns a container's declarative configuration into an execution spec.
///
/// Called once per Start, and only when the container has no task yet.
pub trait SpecTranslator: Send + Sync {
    /// Produces the execution spec for container `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be honoured, e.g. a
    /// bind-mount source or hosts file cannot be created.
    fn translate(&self, id: &ContainerId, config: &ContainerConfig) -> Result<ExecutionSpec>;
}

/// Translator producing hardened specs with per-container state under a root.
#[derive(Debug, Clone)]
pub struct DefaultTranslator {
    root: PathBuf,
}

impl DefaultTranslator {
    /// Creates a translator storing generated files under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates a translator sharing the controller's state root, so the
    /// files it generates live where Delete cleans up.
    #[must_use]
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(config.root.clone())
    }

    /// Returns the generated hosts file path for a container.
    #[must_use]
    pub fn hosts_path(&self, id: &ContainerId) -> PathBuf {
        self.root.join(id.as_str()).join(constants::HOSTS_FILE)
    }
}

impl SpecTranslator for DefaultTranslator {
    fn translate(&self, id: &ContainerId, config: &ContainerConfig) -> Result<ExecutionSpec> {
        let mut spec = ExecutionSpec {
            image: config.image.clone(),
            args: config.args.clone(),
            env: config.env.clone(),
            hostname: id.to_string(),
            labels: config.label_map(),
            no_new_privileges: true,
            apparmor_profile: Some(constants::APP_NAME.to_string()),
            default_seccomp: true,
            ..ExecutionSpec::default()
        };

        for mount in &config.mounts {
            if mount.kind == "bind" {
                ensure_bind_source(Path::new(&mount.source))?;
            }
            spec.mounts.push(mount.clone());
        }

        spec.mounts.push(read_only_bind("/etc/localtime", "/etc/localtime"));

        if config.network == NetworkType::Host {
            spec.host_network = true;
            spec.mounts.push(read_only_bind("/etc/hosts", "/etc/hosts"));
            spec.mounts.push(read_only_bind("/etc/resolv.conf", "/etc/resolv.conf"));
        } else {
            let hosts = self.write_hosts_file(id, &spec.hostname)?;
            spec.mounts.push(read_only_bind(&hosts.to_string_lossy(), "/etc/hosts"));
            let resolv = self.root.join(constants::RESOLV_CONF_FILE);
            spec.mounts.push(read_only_bind(&resolv.to_string_lossy(), "/etc/resolv.conf"));
        }

        if let Some(resources) = &config.resources {
            apply_resources(&mut spec, resources);
        }

        if let Some(gpus) = &config.gpus {
            spec.gpu_devices.clone_from(&gpus.devices);
            spec.gpu_capabilities.clone_from(&gpus.capabilities);
        }

        tracing::debug!(id = %id, mounts = spec.mounts.len(), "execution spec generated");
        Ok(spec)
    }
}

impl DefaultTranslator {
    fn write_hosts_file(&self, id: &ContainerId, hostname: &str) -> Result<PathBuf> {
        let dir = self.root.join(id.as_str());
        std::fs::create_dir_all(&dir).map_err(|e| StewardError::Io {
            path: dir.clone(),
            source: e,
        })?;
        let path = self.hosts_path(id);
        let mut file = std::fs::File::create(&path).map_err(|e| StewardError::Io {
            path: path.clone(),
            source: e,
        })?;
        write!(
            file,
            "127.0.0.1       localhost\n127.0.0.1       {hostname}\n::1     localhost ip6-localhost ip6-loopback\n"
        )
        .map_err(|e| StewardError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

fn ensure_bind_source(source: &Path) -> Result<()> {
    std::fs::create_dir_all(source).map_err(|e| StewardError::Io {
        path: source.to_path_buf(),
        source: e,
    })
}

fn read_only_bind(source: &str, destination: &str) -> Mount {
    Mount {
        kind: "bind".into(),
        source: source.into(),
        destination: destination.into(),
        options: vec!["rbind".into(), "ro".into()],
    }
}

#[allow(clippy::cast_possible_truncation)]
fn apply_resources(spec: &mut ExecutionSpec, resources: &Resources) {
    if resources.memory > 0 {
        spec.memory_limit = Some(resources.memory.saturating_mul(1024 * 1024));
    }
    if resources.cpu > 0.0 {
        spec.cpu_period = Some(constants::CPU_PERIOD_US);
        spec.cpu_quota = Some((resources.cpu * 100_000.0) as i64);
    }
    if resources.score != 0 {
        spec.oom_score_adj = Some(resources.score);
    }
}
