//! The ClusterClient boundary.
//!
//! Checks talk to the cluster exclusively through the [`ClusterClient`]
//! trait so they can be exercised against an in-memory fake. [`KubeCluster`]
//! is the real implementation backed by kube-rs.

use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Service, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use kube::api::{DeleteParams, ListParams, ObjectMeta, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, Resource};
use regex::Regex;

use crate::error::ClusterError;
use crate::tunnel::{self, Tunnel};
use crate::version::ClusterVersion;
use crate::watch::{self, PodWatch};

/// Cluster operations the check engine depends on.
///
/// Grouped as: metadata, existence queries, pod operations, permission
/// queries, tunneling, and watches. Implementations must be thread-safe;
/// callers hold a shared reference for the duration of a check run.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Query the API server version. Doubles as the reachability probe.
    async fn server_version(&self) -> Result<ClusterVersion, ClusterError>;

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError>;

    async fn config_map_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;

    async fn service_account_exists(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, ClusterError>;

    async fn role_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;

    async fn role_binding_exists(&self, namespace: &str, name: &str)
        -> Result<bool, ClusterError>;

    async fn cluster_role_exists(&self, name: &str) -> Result<bool, ClusterError>;

    async fn cluster_role_binding_exists(&self, name: &str) -> Result<bool, ClusterError>;

    async fn service_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>;

    /// List pods carrying the `app=<name>` label.
    async fn list_pods_by_label(
        &self,
        namespace: &str,
        app_label: &str,
    ) -> Result<Vec<Pod>, ClusterError>;

    async fn create_namespace(&self, name: &str) -> Result<(), ClusterError>;

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError>;

    async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<(), ClusterError>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Self-subject access review for a single (group, resource, verb) tuple.
    async fn can_i(
        &self,
        namespace: &str,
        resource: &str,
        verb: &str,
        group: &str,
    ) -> Result<bool, ClusterError>;

    /// Open a local HTTP tunnel onto a cluster Service through the API
    /// server's proxy subresource. The handle must be closed by the caller.
    async fn start_proxy(
        &self,
        bind_host: &str,
        bind_port: u16,
        namespace: &str,
        service: &str,
        service_port: u16,
    ) -> Result<Box<dyn Tunnel>, ClusterError>;

    /// Open a local port-forward tunnel to the first pod whose name matches
    /// `pod_pattern`. The handle must be closed by the caller.
    async fn start_port_forward(
        &self,
        namespace: &str,
        pod_pattern: &Regex,
        port: u16,
    ) -> Result<Box<dyn Tunnel>, ClusterError>;

    /// Start a filtered pod watch. Events for pods whose name matches
    /// `pod_pattern` arrive on the event channel, stream failures on the
    /// error channel. Dropping the returned watch cancels the stream.
    async fn watch_pods(
        &self,
        namespace: &str,
        pod_pattern: &Regex,
    ) -> Result<PodWatch, ClusterError>;
}

/// Real cluster client backed by kube-rs.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    /// Connect using an explicit kubeconfig path and/or context, falling
    /// back to the ambient configuration (KUBECONFIG, in-cluster).
    ///
    /// # Errors
    ///
    /// Returns [`ClusterError::Init`] or [`ClusterError::Kubeconfig`] when
    /// no usable client configuration can be built.
    pub async fn connect(
        kubeconfig: Option<&Path>,
        context: Option<&str>,
    ) -> Result<Self, ClusterError> {
        let options = KubeConfigOptions {
            context: context.map(ToString::to_string),
            ..KubeConfigOptions::default()
        };

        let config = match kubeconfig {
            Some(path) => {
                let kc = Kubeconfig::read_from(path)
                    .map_err(|e| ClusterError::Kubeconfig(e.to_string()))?;
                Config::from_custom_kubeconfig(kc, &options)
                    .await
                    .map_err(|e| ClusterError::Kubeconfig(e.to_string()))?
            }
            None if context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| ClusterError::Kubeconfig(e.to_string()))?,
            None => Config::infer()
                .await
                .map_err(|e| ClusterError::Init(e.to_string()))?,
        };

        let client = Client::try_from(config).map_err(|e| ClusterError::Init(e.to_string()))?;
        Ok(Self { client })
    }

    /// Access the underlying kube client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn exists_namespaced<K>(&self, namespace: &str, name: &str) -> Result<bool, ClusterError>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?.is_some())
    }

    async fn exists_cluster<K>(&self, name: &str) -> Result<bool, ClusterError>
    where
        K: Resource<Scope = k8s_openapi::ClusterResourceScope>
            + Clone
            + serde::de::DeserializeOwned
            + std::fmt::Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?.is_some())
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    async fn server_version(&self) -> Result<ClusterVersion, ClusterError> {
        let info = self.client.apiserver_version().await?;
        ClusterVersion::parse(&info.major, &info.minor)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError> {
        self.exists_cluster::<Namespace>(name).await
    }

    async fn config_map_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.exists_namespaced::<ConfigMap>(namespace, name).await
    }

    async fn service_account_exists(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, ClusterError> {
        self.exists_namespaced::<ServiceAccount>(namespace, name)
            .await
    }

    async fn role_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.exists_namespaced::<Role>(namespace, name).await
    }

    async fn role_binding_exists(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<bool, ClusterError> {
        self.exists_namespaced::<RoleBinding>(namespace, name).await
    }

    async fn cluster_role_exists(&self, name: &str) -> Result<bool, ClusterError> {
        self.exists_cluster::<ClusterRole>(name).await
    }

    async fn cluster_role_binding_exists(&self, name: &str) -> Result<bool, ClusterError> {
        self.exists_cluster::<ClusterRoleBinding>(name).await
    }

    async fn service_exists(&self, namespace: &str, name: &str) -> Result<bool, ClusterError> {
        self.exists_namespaced::<Service>(namespace, name).await
    }

    async fn list_pods_by_label(
        &self,
        namespace: &str,
        app_label: &str,
    ) -> Result<Vec<Pod>, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&format!("app={app_label}"));
        Ok(pods.list(&params).await?.items)
    }

    async fn create_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        namespaces.create(&PostParams::default(), &ns).await?;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn create_pod(&self, namespace: &str, pod: Pod) -> Result<(), ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.create(&PostParams::default(), &pod).await?;
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        pods.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn can_i(
        &self,
        namespace: &str,
        resource: &str,
        verb: &str,
        group: &str,
    ) -> Result<bool, ClusterError> {
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    namespace: Some(namespace.to_string()),
                    resource: Some(resource.to_string()),
                    verb: Some(verb.to_string()),
                    group: Some(group.to_string()),
                    ..ResourceAttributes::default()
                }),
                ..SelfSubjectAccessReviewSpec::default()
            },
            ..SelfSubjectAccessReview::default()
        };

        let reviews: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let created = reviews.create(&PostParams::default(), &review).await?;
        Ok(created.status.is_some_and(|s| s.allowed))
    }

    async fn start_proxy(
        &self,
        bind_host: &str,
        bind_port: u16,
        namespace: &str,
        service: &str,
        service_port: u16,
    ) -> Result<Box<dyn Tunnel>, ClusterError> {
        let handle = tunnel::start_proxy(
            self.client.clone(),
            bind_host,
            bind_port,
            namespace,
            service,
            service_port,
        )
        .await?;
        Ok(Box::new(handle))
    }

    async fn start_port_forward(
        &self,
        namespace: &str,
        pod_pattern: &Regex,
        port: u16,
    ) -> Result<Box<dyn Tunnel>, ClusterError> {
        let handle =
            tunnel::start_port_forward(self.client.clone(), namespace, pod_pattern, port).await?;
        Ok(Box::new(handle))
    }

    async fn watch_pods(
        &self,
        namespace: &str,
        pod_pattern: &Regex,
    ) -> Result<PodWatch, ClusterError> {
        Ok(watch::spawn_pod_watch(
            self.client.clone(),
            namespace,
            pod_pattern.clone(),
        ))
    }
}

/// Whether a pod's observed phase is `Running`.
#[must_use]
pub fn is_pod_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == "Running")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;

    fn pod_with_phase(phase: Option<&str>) -> Pod {
        Pod {
            status: phase.map(|p| PodStatus {
                phase: Some(p.to_string()),
                ..PodStatus::default()
            }),
            ..Pod::default()
        }
    }

    #[test]
    fn test_pod_running_detection() {
        assert!(is_pod_running(&pod_with_phase(Some("Running"))));
        assert!(!is_pod_running(&pod_with_phase(Some("Pending"))));
        assert!(!is_pod_running(&pod_with_phase(None)));
    }
}
