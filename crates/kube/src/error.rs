//! Error types for cluster operations.

use thiserror::Error;

/// Errors that can occur while talking to the cluster.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The client could not be constructed (bad kubeconfig, unreachable
    /// context). Fatal to a check run.
    #[error("failed to initialize cluster client: {0}")]
    Init(String),

    /// A Kubernetes API request failed.
    #[error("kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Reading or parsing a kubeconfig failed.
    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),

    /// A resource query failed for a reason other than absence.
    #[error("query failed: {0}")]
    Query(String),

    /// The watch stream produced an error.
    #[error("watch stream error: {0}")]
    Watch(String),

    /// A tunnel (proxy or port-forward) could not be established.
    #[error("tunnel error: {0}")]
    Tunnel(String),

    /// No pod matched the requested name pattern.
    #[error("no pod matching '{0}' found in namespace '{1}'")]
    PodNotFound(String, String),

    /// The server version string could not be parsed.
    #[error("unparsable server version: {0}")]
    Version(String),
}
