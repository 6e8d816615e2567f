//! Kubernetes client boundary for the flowscope CLI.
//!
//! Everything the check engine needs from a cluster lives behind the
//! [`ClusterClient`] trait: metadata queries, resource existence checks,
//! pod operations, self-subject access reviews, tunnels, and filtered pod
//! watches. [`KubeCluster`] is the kube-rs backed implementation.

pub mod client;
pub mod error;
pub mod tunnel;
pub mod version;
pub mod watch;

pub use client::{is_pod_running, ClusterClient, KubeCluster};
pub use error::ClusterError;
pub use tunnel::{PortForwardHandle, ProxyHandle, Tunnel};
pub use version::{ClusterVersion, MINIMUM_VERSION};
pub use watch::PodWatch;

/// Namespace flowscope installs into unless overridden.
pub const DEFAULT_NAMESPACE: &str = "flowscope";

/// Name of the singleton hub pod (and the Service fronting it).
pub const HUB_NAME: &str = "flowscope-hub";

/// App label of the worker pod set.
pub const WORKER_NAME: &str = "flowscope-worker";

/// Name of the installation's config map.
pub const CONFIG_MAP_NAME: &str = "flowscope-config";

/// Name of the installation's service account.
pub const SERVICE_ACCOUNT_NAME: &str = "flowscope-service-account";

/// Role / role binding names for namespace-restricted installs.
pub const ROLE_NAME: &str = "flowscope-role";
pub const ROLE_BINDING_NAME: &str = "flowscope-role-binding";

/// Cluster role / binding names for cluster-wide installs.
pub const CLUSTER_ROLE_NAME: &str = "flowscope-cluster-role";
pub const CLUSTER_ROLE_BINDING_NAME: &str = "flowscope-cluster-role-binding";
