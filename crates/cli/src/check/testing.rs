//! In-memory cluster fake for check tests.
//!
//! Defaults to a healthy cluster: every resource exists, every permission
//! is allowed, the server runs a supported version. Tests poke holes in
//! that picture per scenario.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, PodStatus};
use kube::api::ObjectMeta;
use regex::Regex;
use tokio::sync::mpsc;

use flowscope_kube::{
    ClusterClient, ClusterError, ClusterVersion, PodWatch, Tunnel,
};

use crate::config::{CheckConfig, CheckMode};

/// Build a pod with a name and phase.
pub fn pod(name: &str, phase: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..PodStatus::default()
        }),
        ..Pod::default()
    }
}

/// A pod watch that immediately delivers one Running pod.
pub fn watch_with_running_pod(name: &str) -> PodWatch {
    let (event_tx, events) = mpsc::channel(4);
    let (_error_tx, errors) = mpsc::channel::<ClusterError>(4);
    event_tx
        .try_send(pod(name, "Running"))
        .expect("channel has capacity");
    PodWatch::from_channels(events, errors)
}

/// Spin up a local HTTP server answering `GET /echo`, as the hub would.
pub async fn echo_server() -> (String, tokio::task::JoinHandle<()>) {
    let app = axum::Router::new().route("/echo", axum::routing::get(|| async { "echo" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), handle)
}

/// A config whose direct hub URL points at a port nothing listens on, with
/// budgets small enough for fast tests.
pub fn unreachable_config() -> CheckConfig {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let free_port = listener.local_addr().expect("local addr").port();
    drop(listener);

    let mut config = CheckConfig::with_defaults(CheckMode::PostInstallation);
    config.proxy_host = "127.0.0.1".to_string();
    config.gui_port = free_port;
    config.direct_retries = 1;
    config.tunnel_retries = 1;
    config.probe_timeout = Duration::from_millis(300);
    config
}

struct FakeTunnel {
    url: String,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Tunnel for FakeTunnel {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(self: Box<Self>) -> Result<(), ClusterError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

type TunnelPlan = Option<(String, Arc<AtomicBool>)>;

/// Configurable in-memory [`ClusterClient`].
#[derive(Default)]
pub struct FakeCluster {
    version: Mutex<Option<ClusterVersion>>,
    version_failure: Mutex<Option<String>>,
    missing: Mutex<HashSet<(String, String)>>,
    erroring: Mutex<HashSet<(String, String)>>,
    pods_by_label: Mutex<HashMap<String, Vec<Pod>>>,
    denied_permissions: Mutex<HashSet<(String, String)>>,
    failing_permissions: Mutex<HashSet<(String, String)>>,
    can_i_count: AtomicUsize,
    proxy_plan: Mutex<TunnelPlan>,
    port_forward_plan: Mutex<TunnelPlan>,
    proxy_count: AtomicUsize,
    port_forward_count: AtomicUsize,
    watches: Mutex<VecDeque<PodWatch>>,
    pod_creation_failure: Mutex<Option<String>>,
    created_pods: Mutex<Vec<String>>,
    deleted_pods: Mutex<Vec<String>>,
    created_namespaces: Mutex<Vec<String>>,
    deleted_namespaces: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn set_version(&self, major: u32, minor: u32) {
        *self.version.lock().unwrap() = Some(ClusterVersion { major, minor });
    }

    pub fn fail_version_query(&self, message: &str) {
        *self.version_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Mark a resource as absent. `kind` is e.g. "namespace", "configmap".
    pub fn set_missing(&self, kind: &str, name: &str) {
        self.missing
            .lock()
            .unwrap()
            .insert((kind.to_string(), name.to_string()));
    }

    /// Make the existence query for a resource fail.
    pub fn set_error(&self, kind: &str, name: &str) {
        self.erroring
            .lock()
            .unwrap()
            .insert((kind.to_string(), name.to_string()));
    }

    pub fn set_pods(&self, app_label: &str, pods: Vec<Pod>) {
        self.pods_by_label
            .lock()
            .unwrap()
            .insert(app_label.to_string(), pods);
    }

    pub fn deny_permission(&self, resource: &str, verb: &str) {
        self.denied_permissions
            .lock()
            .unwrap()
            .insert((resource.to_string(), verb.to_string()));
    }

    pub fn fail_permission(&self, resource: &str, verb: &str) {
        self.failing_permissions
            .lock()
            .unwrap()
            .insert((resource.to_string(), verb.to_string()));
    }

    pub fn can_i_calls(&self) -> usize {
        self.can_i_count.load(Ordering::SeqCst)
    }

    /// Make `start_proxy` succeed with a tunnel to `url`; returns the flag
    /// set once the tunnel is closed.
    pub fn serve_proxy(&self, url: &str) -> Arc<AtomicBool> {
        let closed = Arc::new(AtomicBool::new(false));
        *self.proxy_plan.lock().unwrap() = Some((url.to_string(), closed.clone()));
        closed
    }

    /// Make `start_port_forward` succeed with a tunnel to `url`.
    pub fn serve_port_forward(&self, url: &str) -> Arc<AtomicBool> {
        let closed = Arc::new(AtomicBool::new(false));
        *self.port_forward_plan.lock().unwrap() = Some((url.to_string(), closed.clone()));
        closed
    }

    pub fn proxy_attempts(&self) -> usize {
        self.proxy_count.load(Ordering::SeqCst)
    }

    pub fn port_forward_attempts(&self) -> usize {
        self.port_forward_count.load(Ordering::SeqCst)
    }

    /// Queue a watch to hand out from the next `watch_pods` call.
    pub fn queue_watch(&self, watch: PodWatch) {
        self.watches.lock().unwrap().push_back(watch);
    }

    pub fn fail_pod_creation(&self, message: &str) {
        *self.pod_creation_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn created_pods(&self) -> Vec<String> {
        self.created_pods.lock().unwrap().clone()
    }

    pub fn deleted_pods(&self) -> Vec<String> {
        self.deleted_pods.lock().unwrap().clone()
    }

    pub fn created_namespaces(&self) -> Vec<String> {
        self.created_namespaces.lock().unwrap().clone()
    }

    pub fn deleted_namespaces(&self) -> Vec<String> {
        self.deleted_namespaces.lock().unwrap().clone()
    }

    fn existence(&self, kind: &str, name: &str) -> Result<bool, ClusterError> {
        let key = (kind.to_string(), name.to_string());
        if self.erroring.lock().unwrap().contains(&key) {
            return Err(ClusterError::Query(format!(
                "injected failure for {kind} '{name}'"
            )));
        }
        Ok(!self.missing.lock().unwrap().contains(&key))
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn server_version(&self) -> Result<ClusterVersion, ClusterError> {
        if let Some(message) = self.version_failure.lock().unwrap().clone() {
            return Err(ClusterError::Query(message));
        }
        Ok(self
            .version
            .lock()
            .unwrap()
            .unwrap_or(ClusterVersion {
                major: 1,
                minor: 31,
            }))
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError> {
        self.existence("namespace", name)
    }

    async fn config_map_exists(&self, _namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.existence("configmap", name)
    }

    async fn service_account_exists(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<bool, ClusterError> {
        self.existence("serviceaccount", name)
    }

    async fn role_exists(&self, _namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.existence("role", name)
    }

    async fn role_binding_exists(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<bool, ClusterError> {
        self.existence("rolebinding", name)
    }

    async fn cluster_role_exists(&self, name: &str) -> Result<bool, ClusterError> {
        self.existence("clusterrole", name)
    }

    async fn cluster_role_binding_exists(&self, name: &str) -> Result<bool, ClusterError> {
        self.existence("clusterrolebinding", name)
    }

    async fn service_exists(&self, _namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.existence("service", name)
    }

    async fn list_pods_by_label(
        &self,
        _namespace: &str,
        app_label: &str,
    ) -> Result<Vec<Pod>, ClusterError> {
        Ok(self
            .pods_by_label
            .lock()
            .unwrap()
            .get(app_label)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_namespace(&self, name: &str) -> Result<(), ClusterError> {
        self.created_namespaces.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        self.deleted_namespaces.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn create_pod(&self, _namespace: &str, pod: Pod) -> Result<(), ClusterError> {
        if let Some(message) = self.pod_creation_failure.lock().unwrap().clone() {
            return Err(ClusterError::Query(message));
        }
        self.created_pods
            .lock()
            .unwrap()
            .push(pod.metadata.name.unwrap_or_default());
        Ok(())
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.deleted_pods.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn can_i(
        &self,
        _namespace: &str,
        resource: &str,
        verb: &str,
        _group: &str,
    ) -> Result<bool, ClusterError> {
        self.can_i_count.fetch_add(1, Ordering::SeqCst);
        let key = (resource.to_string(), verb.to_string());
        if self.failing_permissions.lock().unwrap().contains(&key) {
            return Err(ClusterError::Query(format!(
                "injected failure for {verb} {resource}"
            )));
        }
        Ok(!self.denied_permissions.lock().unwrap().contains(&key))
    }

    async fn start_proxy(
        &self,
        _bind_host: &str,
        _bind_port: u16,
        _namespace: &str,
        _service: &str,
        _service_port: u16,
    ) -> Result<Box<dyn Tunnel>, ClusterError> {
        self.proxy_count.fetch_add(1, Ordering::SeqCst);
        match self.proxy_plan.lock().unwrap().clone() {
            Some((url, closed)) => Ok(Box::new(FakeTunnel { url, closed })),
            None => Err(ClusterError::Tunnel("proxy tunnel unavailable".into())),
        }
    }

    async fn start_port_forward(
        &self,
        _namespace: &str,
        _pod_pattern: &Regex,
        _port: u16,
    ) -> Result<Box<dyn Tunnel>, ClusterError> {
        self.port_forward_count.fetch_add(1, Ordering::SeqCst);
        match self.port_forward_plan.lock().unwrap().clone() {
            Some((url, closed)) => Ok(Box::new(FakeTunnel { url, closed })),
            None => Err(ClusterError::Tunnel(
                "port-forward tunnel unavailable".into(),
            )),
        }
    }

    async fn watch_pods(
        &self,
        _namespace: &str,
        _pod_pattern: &Regex,
    ) -> Result<PodWatch, ClusterError> {
        if let Some(watch) = self.watches.lock().unwrap().pop_front() {
            return Ok(watch);
        }
        // No queued watch: hand out one whose channels are already closed.
        let (_event_tx, events) = mpsc::channel(1);
        let (_error_tx, errors) = mpsc::channel(1);
        Ok(PodWatch::from_channels(events, errors))
    }
}
