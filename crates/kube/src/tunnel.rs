//! Local tunnels onto the cluster.
//!
//! Two transport strategies for reaching an in-cluster service when a direct
//! connection is unavailable:
//!
//! - [`ProxyHandle`]: a local HTTP server that forwards requests through the
//!   API server's service proxy subresource (the `kubectl proxy` shape).
//! - [`PortForwardHandle`]: a local TCP listener bridged to a pod port via
//!   the port-forward subprotocol.
//!
//! Both handles own their background task and must be closed (or dropped)
//! by the caller; dropping aborts the task.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};
use regex::Regex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::ClusterError;

/// A closable transport tunnel with a local URL.
///
/// Implemented by both tunnel strategies; the check engine (and its test
/// fakes) only see this interface.
#[async_trait::async_trait]
pub trait Tunnel: Send {
    /// Local base URL the tunnel serves on.
    fn url(&self) -> &str;

    /// Tear the tunnel down, releasing its background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing task failed; callers log teardown
    /// failures and never let them affect a check verdict.
    async fn close(self: Box<Self>) -> Result<(), ClusterError>;
}

/// A running API-server proxy tunnel bound to a local address.
pub struct ProxyHandle {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ProxyHandle {
    /// Local base URL the tunnel serves on.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Shut the tunnel down and wait for the server task to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the server task panicked.
    pub async fn close(mut self) -> Result<(), ClusterError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => return Err(ClusterError::Tunnel(e.to_string())),
            }
        }
        Ok(())
    }
}

impl Drop for ProxyHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl Tunnel for ProxyHandle {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(self: Box<Self>) -> Result<(), ClusterError> {
        ProxyHandle::close(*self).await
    }
}

#[derive(Clone)]
struct ProxyState {
    client: Client,
    /// API server path of the proxied service, without trailing slash.
    base_path: Arc<String>,
}

/// Start a local proxy tunnel onto `service` in `namespace`.
pub(crate) async fn start_proxy(
    client: Client,
    bind_host: &str,
    bind_port: u16,
    namespace: &str,
    service: &str,
    service_port: u16,
) -> Result<ProxyHandle, ClusterError> {
    let listener = TcpListener::bind((bind_host, bind_port))
        .await
        .map_err(|e| ClusterError::Tunnel(format!("bind {bind_host}:{bind_port}: {e}")))?;
    let addr = listener
        .local_addr()
        .map_err(|e| ClusterError::Tunnel(e.to_string()))?;

    let state = ProxyState {
        client,
        base_path: Arc::new(format!(
            "/api/v1/namespaces/{namespace}/services/{service}:{service_port}/proxy"
        )),
    };
    let router = Router::new().fallback(forward).with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let serve = axum::serve(listener, router).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = serve.await {
            warn!(error = %e, "proxy tunnel server exited with error");
        }
    });

    debug!(%addr, "proxy tunnel listening");
    Ok(ProxyHandle {
        url: format!("http://{addr}"),
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}

/// Forward an incoming request through the API server proxy path.
///
/// Bodies are not forwarded; the tunnel exists for GET-style health probes.
async fn forward(State(state): State<ProxyState>, req: Request) -> Response {
    let suffix = req
        .uri()
        .path_and_query()
        .map_or("/", http::uri::PathAndQuery::as_str);
    let upstream = format!("{}{suffix}", state.base_path);

    let proxied = match http::Request::builder()
        .method(req.method().clone())
        .uri(&upstream)
        .body(Vec::new())
    {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_GATEWAY, e.to_string()).into_response(),
    };

    match state.client.request_text(proxied).await {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(e) => {
            debug!(error = %e, upstream, "proxy tunnel request failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

/// A running port-forward tunnel bound to a local ephemeral port.
pub struct PortForwardHandle {
    url: String,
    task: Option<JoinHandle<()>>,
}

impl PortForwardHandle {
    /// Local base URL the tunnel serves on.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Tear the tunnel down.
    ///
    /// # Errors
    ///
    /// Returns an error if the forwarding task panicked.
    pub async fn close(mut self) -> Result<(), ClusterError> {
        if let Some(task) = self.task.take() {
            task.abort();
            match task.await {
                Ok(()) => {}
                Err(e) if e.is_cancelled() => {}
                Err(e) => return Err(ClusterError::Tunnel(e.to_string())),
            }
        }
        Ok(())
    }
}

impl Drop for PortForwardHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl Tunnel for PortForwardHandle {
    fn url(&self) -> &str {
        &self.url
    }

    async fn close(self: Box<Self>) -> Result<(), ClusterError> {
        PortForwardHandle::close(*self).await
    }
}

/// Start a port-forward to the first pod matching `pod_pattern`.
pub(crate) async fn start_port_forward(
    client: Client,
    namespace: &str,
    pod_pattern: &Regex,
    port: u16,
) -> Result<PortForwardHandle, ClusterError> {
    let pods: Api<Pod> = Api::namespaced(client, namespace);

    let pod_name = pods
        .list(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter_map(|p| p.metadata.name)
        .find(|name| pod_pattern.is_match(name))
        .ok_or_else(|| {
            ClusterError::PodNotFound(pod_pattern.to_string(), namespace.to_string())
        })?;

    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| ClusterError::Tunnel(e.to_string()))?;
    let addr = listener
        .local_addr()
        .map_err(|e| ClusterError::Tunnel(e.to_string()))?;

    let task = tokio::spawn(async move {
        loop {
            let (mut local, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, "port-forward listener accept failed");
                    break;
                }
            };
            debug!(%peer, pod = %pod_name, "port-forward connection accepted");

            let mut forwarder = match pods.portforward(&pod_name, &[port]).await {
                Ok(f) => f,
                Err(e) => {
                    warn!(error = %e, pod = %pod_name, "failed to open port-forward");
                    continue;
                }
            };
            let Some(mut upstream) = forwarder.take_stream(port) else {
                warn!(pod = %pod_name, port, "port-forward stream unavailable");
                continue;
            };

            if let Err(e) = tokio::io::copy_bidirectional(&mut local, &mut upstream).await {
                debug!(error = %e, "port-forward stream closed");
            }
        }
    });

    debug!(%addr, "port-forward tunnel listening");
    Ok(PortForwardHandle {
        url: format!("http://{addr}"),
        task: Some(task),
    })
}
