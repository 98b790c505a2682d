//! In-memory collaborators shared by the integration tests.
//!
//! Every fake appends the calls that matter for ordering to one shared
//! log, e.g. `create_task web1` or `register web1 web 10.0.0.5`.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::Signal;
use steward_common::config::{Check, CheckType, ContainerConfig, MonitorConfig, Service};
use steward_common::constants::STATUS_LABEL;
use steward_common::error::{Result, StewardError};
use steward_common::types::{ContainerId, Namespace, NetworkType, TaskStatus};
use steward_monitor::backends::Backends;
use steward_monitor::monitor::Monitor;
use steward_monitor::network::{Network, Networks};
use steward_monitor::reconcile::Reconciler;
use steward_monitor::registry::Registry;
use steward_monitor::runtime::{
    Container, ExitStatus, ExitWaiter, LabelMutation, RuntimeClient, Task, TaskIo,
};
use steward_monitor::translate::ExecutionSpec;
use tokio::sync::oneshot;

/// Shared, ordered record of collaborator calls.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    /// Every entry except namespace listings.
    pub fn calls(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !e.starts_with("list "))
            .cloned()
            .collect()
    }

    /// Every entry, including namespace listings.
    pub fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── Runtime ──────────────────────────────────────────────────────────

type Store = Arc<Mutex<Vec<Arc<FakeContainer>>>>;
type TaskSlot = Arc<Mutex<Option<Arc<FakeTask>>>>;

pub struct FakeRuntime {
    namespaces: Mutex<Vec<(Namespace, Store)>>,
    failing_lists: Mutex<HashSet<String>>,
    pub fail_namespaces: AtomicBool,
    pids: Arc<AtomicU32>,
    log: Log,
}

impl FakeRuntime {
    pub fn new(log: Log) -> Arc<Self> {
        Arc::new(Self {
            namespaces: Mutex::new(Vec::new()),
            failing_lists: Mutex::new(HashSet::new()),
            fail_namespaces: AtomicBool::new(false),
            pids: Arc::new(AtomicU32::new(1000)),
            log,
        })
    }

    fn store(&self, namespace: &str) -> Store {
        let mut namespaces = self.namespaces.lock().unwrap();
        if let Some((_, store)) = namespaces.iter().find(|(ns, _)| ns.as_str() == namespace) {
            return Arc::clone(store);
        }
        let store: Store = Arc::new(Mutex::new(Vec::new()));
        namespaces.push((Namespace::new(namespace), Arc::clone(&store)));
        store
    }

    pub fn add_namespace(&self, namespace: &str) {
        let _ = self.store(namespace);
    }

    /// Adds a container whose status label is `status` (if any).
    pub fn add_container(
        &self,
        namespace: &str,
        config: ContainerConfig,
        status: Option<&str>,
    ) -> Arc<FakeContainer> {
        let store = self.store(namespace);
        let mut labels = HashMap::new();
        if let Some(status) = status {
            let _ = labels.insert(STATUS_LABEL.to_string(), status.to_string());
        }
        let container = Arc::new(FakeContainer {
            id: ContainerId::new(config.id.clone()),
            namespace: Namespace::new(namespace),
            labels: Mutex::new(labels),
            config,
            slot: Arc::new(Mutex::new(None)),
            store: Arc::downgrade(&store),
            pids: Arc::clone(&self.pids),
            log: self.log.clone(),
            exit: Mutex::new(ExitBehavior::OnTerm),
            fail_labels: AtomicBool::new(false),
            fail_config: AtomicBool::new(false),
            last_spec: Mutex::new(None),
        });
        store.lock().unwrap().push(Arc::clone(&container));
        container
    }

    pub fn fail_listing(&self, namespace: &str) {
        let _ = self
            .failing_lists
            .lock()
            .unwrap()
            .insert(namespace.to_string());
    }

    pub fn container_ids(&self, namespace: &str) -> Vec<String> {
        self.store(namespace)
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.id.to_string())
            .collect()
    }
}

#[async_trait]
impl RuntimeClient for FakeRuntime {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        if self.fail_namespaces.load(Ordering::SeqCst) {
            return Err(StewardError::backend("list namespaces", "runtime", "unavailable"));
        }
        Ok(self
            .namespaces
            .lock()
            .unwrap()
            .iter()
            .map(|(ns, _)| ns.clone())
            .collect())
    }

    async fn list_containers(
        &self,
        namespace: &Namespace,
        label: &str,
    ) -> Result<Vec<Arc<dyn Container>>> {
        self.log.push(format!("list {namespace}"));
        if self.failing_lists.lock().unwrap().contains(namespace.as_str()) {
            return Err(StewardError::backend("list containers", namespace.as_str(), "unavailable"));
        }
        let store = self.store(namespace.as_str());
        let containers = store.lock().unwrap();
        Ok(containers
            .iter()
            .filter(|c| c.labels.lock().unwrap().contains_key(label))
            .map(|c| Arc::clone(c) as Arc<dyn Container>)
            .collect())
    }
}

// ── Containers ───────────────────────────────────────────────────────

/// How a fake task reacts to SIGTERM. SIGKILL always ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitBehavior {
    OnTerm,
    After(Duration),
    Never,
}

pub struct FakeContainer {
    id: ContainerId,
    namespace: Namespace,
    labels: Mutex<HashMap<String, String>>,
    config: ContainerConfig,
    slot: TaskSlot,
    store: Weak<Mutex<Vec<Arc<FakeContainer>>>>,
    pids: Arc<AtomicU32>,
    log: Log,
    exit: Mutex<ExitBehavior>,
    pub fail_labels: AtomicBool,
    pub fail_config: AtomicBool,
    pub last_spec: Mutex<Option<ExecutionSpec>>,
}

impl FakeContainer {
    /// Behaviour of tasks created from now on.
    pub fn set_exit_behavior(&self, behavior: ExitBehavior) {
        *self.exit.lock().unwrap() = behavior;
        if let Some(task) = self.fake_task() {
            *task.behavior.lock().unwrap() = behavior;
        }
    }

    fn make_task(&self, status: TaskStatus) -> Arc<FakeTask> {
        let behavior = *self.exit.lock().unwrap();
        let pid = self.pids.fetch_add(1, Ordering::SeqCst);
        let task = Arc::new_cyclic(|me| FakeTask {
            me: me.clone(),
            id: self.id.to_string(),
            pid,
            status: Mutex::new(status),
            waiters: Mutex::new(Vec::new()),
            behavior: Mutex::new(behavior),
            slot: Arc::downgrade(&self.slot),
            log: self.log.clone(),
            attached: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
        });
        *self.slot.lock().unwrap() = Some(Arc::clone(&task));
        task
    }

    /// Gives the container a running task, as if started before the test.
    pub fn with_running_task(&self) -> Arc<FakeTask> {
        self.make_task(TaskStatus::Running)
    }

    /// Gives the container a task whose process has exited.
    pub fn with_exited_task(&self) -> Arc<FakeTask> {
        self.make_task(TaskStatus::Stopped)
    }

    pub fn fake_task(&self) -> Option<Arc<FakeTask>> {
        self.slot.lock().unwrap().clone()
    }

    pub fn label(&self, key: &str) -> Option<String> {
        self.labels.lock().unwrap().get(key).cloned()
    }

    pub fn set_label(&self, key: &str, value: &str) {
        let _ = self
            .labels
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl Container for FakeContainer {
    fn id(&self) -> &ContainerId {
        &self.id
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn labels(&self) -> Result<HashMap<String, String>> {
        if self.fail_labels.load(Ordering::SeqCst) {
            return Err(StewardError::backend("labels", self.id.as_str(), "metadata store unavailable"));
        }
        Ok(self.labels.lock().unwrap().clone())
    }

    async fn update(&self, mutation: &LabelMutation) -> Result<()> {
        mutation.apply_to(&mut self.labels.lock().unwrap());
        Ok(())
    }

    async fn config(&self) -> Result<ContainerConfig> {
        if self.fail_config.load(Ordering::SeqCst) {
            return Err(StewardError::Config {
                message: format!("malformed configuration for {}", self.id),
            });
        }
        Ok(self.config.clone())
    }

    async fn task(&self, io: TaskIo) -> Result<Arc<dyn Task>> {
        let task = self.fake_task().ok_or_else(|| StewardError::not_found("task", self.id.as_str()))?;
        if io == TaskIo::Stdio {
            let _ = task.attached.fetch_add(1, Ordering::SeqCst);
        }
        Ok(task as Arc<dyn Task>)
    }

    async fn new_task(&self, spec: &ExecutionSpec) -> Result<Arc<dyn Task>> {
        if self.fake_task().is_some() {
            return Err(StewardError::backend("create task", self.id.as_str(), "task already exists"));
        }
        self.log.push(format!("create_task {}", self.id));
        *self.last_spec.lock().unwrap() = Some(spec.clone());
        Ok(self.make_task(TaskStatus::Created) as Arc<dyn Task>)
    }

    async fn delete(&self) -> Result<()> {
        if self.fake_task().is_some() {
            return Err(StewardError::backend("delete container", self.id.as_str(), "task still exists"));
        }
        self.log.push(format!("delete_container {}", self.id));
        if let Some(store) = self.store.upgrade() {
            store.lock().unwrap().retain(|c| c.id != self.id);
        }
        Ok(())
    }
}

// ── Tasks ────────────────────────────────────────────────────────────

pub struct FakeTask {
    me: Weak<FakeTask>,
    id: String,
    pid: u32,
    status: Mutex<TaskStatus>,
    waiters: Mutex<Vec<oneshot::Sender<ExitStatus>>>,
    behavior: Mutex<ExitBehavior>,
    slot: Weak<Mutex<Option<Arc<FakeTask>>>>,
    log: Log,
    pub attached: AtomicUsize,
    pub fail_start: AtomicBool,
}

impl FakeTask {
    pub fn current_status(&self) -> TaskStatus {
        *self.status.lock().unwrap()
    }

    /// Ends the process as if it exited on its own.
    pub fn exit(&self, code: u32) {
        *self.status.lock().unwrap() = TaskStatus::Stopped;
        for waiter in self.waiters.lock().unwrap().drain(..) {
            let _ = waiter.send(ExitStatus::now(code));
        }
    }
}

#[async_trait]
impl Task for FakeTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn pid(&self) -> u32 {
        self.pid
    }

    async fn status(&self) -> Result<TaskStatus> {
        Ok(self.current_status())
    }

    async fn start(&self) -> Result<()> {
        self.log.push(format!("start {}", self.id));
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(StewardError::backend("start", self.id.as_str(), "exec failed"));
        }
        *self.status.lock().unwrap() = TaskStatus::Running;
        Ok(())
    }

    async fn kill(&self, signal: Signal) -> Result<()> {
        self.log.push(format!("kill {} {}", self.id, signal.as_str()));
        if self.current_status() != TaskStatus::Running {
            return Err(StewardError::not_found("process", self.id.as_str()));
        }
        if signal == Signal::SIGKILL {
            self.exit(137);
            return Ok(());
        }
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            ExitBehavior::OnTerm => self.exit(0),
            ExitBehavior::After(delay) => {
                let me = self.me.clone();
                let _ = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(task) = me.upgrade() {
                        task.exit(0);
                    }
                });
            }
            ExitBehavior::Never => {}
        }
        Ok(())
    }

    async fn wait(&self) -> Result<ExitWaiter> {
        let (tx, rx) = oneshot::channel();
        if self.current_status() == TaskStatus::Stopped {
            let _ = tx.send(ExitStatus::now(0));
        } else {
            self.waiters.lock().unwrap().push(tx);
        }
        Ok(rx)
    }

    async fn delete(&self) -> Result<()> {
        if self.current_status() == TaskStatus::Running {
            return Err(StewardError::backend("delete task", self.id.as_str(), "task is running"));
        }
        self.log.push(format!("delete_task {}", self.id));
        if let Some(slot) = self.slot.upgrade() {
            *slot.lock().unwrap() = None;
        }
        Ok(())
    }
}

// ── Registry ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeRegistry {
    log: Log,
    registrations: Mutex<Vec<(String, String, String, u16)>>,
    maintenance: Mutex<HashMap<String, String>>,
    pub fail_register: AtomicBool,
    pub fail_deregister: AtomicBool,
}

impl FakeRegistry {
    pub fn new(log: Log) -> Arc<Self> {
        Arc::new(Self {
            log,
            ..Self::default()
        })
    }

    pub fn registrations(&self) -> Vec<(String, String, String, u16)> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.registrations.lock().unwrap().iter().any(|r| r.0 == id)
    }

    pub fn maintenance(&self, id: &str) -> Option<String> {
        self.maintenance.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn register(
        &self,
        id: &ContainerId,
        name: &str,
        address: &str,
        service: &Service,
    ) -> Result<()> {
        self.log.push(format!("register {id} {name} {address}"));
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(StewardError::backend("register", id.as_str(), "registry unavailable"));
        }
        let mut registrations = self.registrations.lock().unwrap();
        registrations.retain(|r| !(r.0 == id.as_str() && r.1 == name));
        registrations.push((id.to_string(), name.to_string(), address.to_string(), service.port));
        Ok(())
    }

    async fn deregister(&self, id: &ContainerId) -> Result<()> {
        self.log.push(format!("deregister {id}"));
        if self.fail_deregister.load(Ordering::SeqCst) {
            return Err(StewardError::backend("deregister", id.as_str(), "registry unavailable"));
        }
        self.registrations
            .lock()
            .unwrap()
            .retain(|r| r.0 != id.as_str());
        Ok(())
    }

    async fn enable_maintenance(&self, id: &ContainerId, message: &str) -> Result<()> {
        let _ = self
            .maintenance
            .lock()
            .unwrap()
            .insert(id.to_string(), message.to_string());
        Ok(())
    }

    async fn disable_maintenance(&self, id: &ContainerId) -> Result<()> {
        let _ = self.maintenance.lock().unwrap().remove(id.as_str());
        Ok(())
    }
}

// ── Network ──────────────────────────────────────────────────────────

pub struct FakeNetwork {
    address: String,
    delay: Duration,
    log: Log,
    pub fail_create: AtomicBool,
}

impl FakeNetwork {
    pub fn new(log: Log, address: &str) -> Arc<Self> {
        Self::with_delay(log, address, Duration::ZERO)
    }

    pub fn with_delay(log: Log, address: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            delay,
            log,
            fail_create: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn create(&self, task: &dyn Task) -> Result<String> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.push(format!("network.create {}", task.id()));
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(StewardError::backend("network create", task.id(), "no addresses left"));
        }
        Ok(self.address.clone())
    }

    async fn remove(&self, container: &dyn Container) -> Result<()> {
        self.log.push(format!("network.remove {}", container.id()));
        Ok(())
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub const CNI_ADDRESS: &str = "10.0.0.5";
pub const HOST_ADDRESS: &str = "192.168.1.10";

pub struct Harness {
    pub log: Log,
    pub runtime: Arc<FakeRuntime>,
    pub registry: Arc<FakeRegistry>,
    pub cni: Arc<FakeNetwork>,
    pub backends: Backends,
    pub root: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut MonitorConfig)) -> Self {
        let log = Log::default();
        let cni = FakeNetwork::new(log.clone(), CNI_ADDRESS);
        Self::build(log.clone(), Arc::clone(&cni), customize)
    }

    pub fn with_cni(log: Log, cni: Arc<FakeNetwork>) -> Self {
        Self::build(log, cni, |_| {})
    }

    fn build(
        log: Log,
        cni: Arc<FakeNetwork>,
        customize: impl FnOnce(&mut MonitorConfig),
    ) -> Self {
        init_tracing();
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = MonitorConfig {
            root: root.path().to_path_buf(),
            ..MonitorConfig::default()
        };
        customize(&mut config);
        let runtime = FakeRuntime::new(log.clone());
        let registry = FakeRegistry::new(log.clone());
        let networks = Networks::new()
            .with(NetworkType::Cni, Arc::clone(&cni) as Arc<dyn Network>)
            .with(
                NetworkType::Host,
                FakeNetwork::new(log.clone(), HOST_ADDRESS) as Arc<dyn Network>,
            );
        let backends = Backends::with_default_translator(
            Arc::clone(&registry) as Arc<dyn Registry>,
            networks,
            config,
        );
        Self {
            log,
            runtime,
            registry,
            cni,
            backends,
            root,
        }
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.runtime.as_ref(), &self.backends)
    }

    pub fn monitor(&self) -> Arc<Monitor> {
        Arc::new(Monitor::new(
            Arc::clone(&self.runtime) as Arc<dyn RuntimeClient>,
            self.backends.clone(),
        ))
    }

    pub fn namespace(name: &str) -> Namespace {
        Namespace::new(name)
    }
}

/// A container exposing one HTTP service named `web` on port 80.
pub fn web_config(id: &str, network: NetworkType) -> ContainerConfig {
    let mut services = BTreeMap::new();
    let _ = services.insert(
        "web".to_string(),
        Service {
            port: 80,
            labels: vec!["public".into()],
            checks: vec![Check {
                kind: CheckType::Http,
                interval: 5,
                timeout: 2,
            }],
        },
    );
    ContainerConfig {
        id: id.to_string(),
        image: "docker.io/library/nginx:latest".into(),
        network,
        services,
        ..ContainerConfig::default()
    }
}

/// A container without services.
pub fn job_config(id: &str, network: NetworkType) -> ContainerConfig {
    ContainerConfig {
        id: id.to_string(),
        image: "docker.io/library/busybox:latest".into(),
        network,
        ..ContainerConfig::default()
    }
}
