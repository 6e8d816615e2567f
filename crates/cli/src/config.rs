//! Check configuration types.
//!
//! All knobs for a check run live in [`CheckConfig`], threaded explicitly
//! into the orchestrator and every checker. Nothing here is ambient state.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which installation phase the checks diagnose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Before installing: verify permissions and image pullability.
    PreInstallation,
    /// After installing: verify resources and hub connectivity.
    #[default]
    PostInstallation,
}

impl std::fmt::Display for CheckMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreInstallation => write!(f, "pre-installation"),
            Self::PostInstallation => write!(f, "post-installation"),
        }
    }
}

/// Scope of the installation's RBAC footprint, resolved once from config.
///
/// Overriding the target namespace means the install was (or will be)
/// restricted to that namespace; the default namespace implies a
/// cluster-wide install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionScope {
    /// Role/RoleBinding install, confined to one namespace.
    NamespaceRestricted,
    /// ClusterRole/ClusterRoleBinding install.
    ClusterWide,
}

/// Full configuration for one check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Namespace the installation lives in (or will live in).
    pub namespace: String,
    /// Explicit kubeconfig path; `None` uses the ambient configuration.
    pub kubeconfig: Option<PathBuf>,
    /// Kube context to use; `None` uses the current context.
    pub kube_context: Option<String>,
    /// Which stage branch to run.
    pub mode: CheckMode,
    /// Port the hub's GUI/API listens on.
    pub gui_port: u16,
    /// Host the direct connection and the proxy tunnel bind to.
    pub proxy_host: String,
    /// Retries for the direct connection attempt.
    pub direct_retries: u32,
    /// Retries for each tunnel probe.
    pub tunnel_retries: u32,
    /// Per-attempt timeout for connectivity probes.
    pub probe_timeout: Duration,
    /// Deadline for the image-pull readiness watch.
    pub watch_deadline: Duration,
}

impl CheckConfig {
    /// Config with the defaults the CLI ships with.
    #[must_use]
    pub fn with_defaults(mode: CheckMode) -> Self {
        Self {
            namespace: flowscope_kube::DEFAULT_NAMESPACE.to_string(),
            kubeconfig: None,
            kube_context: None,
            mode,
            gui_port: 8899,
            proxy_host: "127.0.0.1".to_string(),
            direct_retries: 1,
            tunnel_retries: 3,
            probe_timeout: Duration::from_secs(2),
            watch_deadline: Duration::from_secs(30),
        }
    }

    /// RBAC scope implied by the configured namespace.
    #[must_use]
    pub fn permission_scope(&self) -> PermissionScope {
        if self.namespace == flowscope_kube::DEFAULT_NAMESPACE {
            PermissionScope::ClusterWide
        } else {
            PermissionScope::NamespaceRestricted
        }
    }

    /// Base URL of the hub as seen from this machine.
    #[must_use]
    pub fn hub_url(&self) -> String {
        format!("http://{}:{}", self.proxy_host, self.gui_port)
    }
}
