//! System-wide constants and default paths.

/// Default root for per-container on-disk state (hosts files, resolv.conf).
pub const DEFAULT_ROOT: &str = "/var/lib/steward";

/// Label carrying a container's desired status.
pub const STATUS_LABEL: &str = "io.steward/restart.status";

/// Label recording the address returned by the network provider.
pub const ADDRESS_LABEL: &str = "io.steward/network.address";

/// Label recording that the container's services are registered.
pub const REGISTERED_LABEL: &str = "io.steward/service.registered";

/// Seconds between reconcile passes when none is configured.
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Seconds a Stop or Delete waits for a task to exit after SIGTERM.
pub const DEFAULT_STOP_GRACE_SECS: u64 = 10;

/// Seconds each shutdown unit waits for its task to exit.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Name of the generated hosts file inside a container's state directory.
pub const HOSTS_FILE: &str = "hosts";

/// Name of the shared resolver configuration under the state root.
pub const RESOLV_CONF_FILE: &str = "resolv.conf";

/// CPU period in microseconds used when converting CPU counts to quotas.
pub const CPU_PERIOD_US: u64 = 100_000;

/// Application name used in log output and AppArmor profile selection.
pub const APP_NAME: &str = "steward";
