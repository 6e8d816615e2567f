//! In-cluster image pull probe.
//!
//! Creates a throwaway pod (and, for cluster-wide installs, the target
//! namespace) and watches it until it reaches Running, proving the cluster
//! can pull flowscope images from the registry. Everything the probe
//! creates is deleted on every exit path; cleanup failures are logged and
//! never change the verdict.

use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};
use kube::api::ObjectMeta;
use regex::Regex;
use tracing::debug;

use flowscope_kube::ClusterClient;

use crate::check::readiness::{self, WatchOutcome};
use crate::check::report::CheckResult;
use crate::config::{CheckConfig, PermissionScope};

const CATEGORY: &str = "image-pull-in-cluster";

const PROBE_POD_NAME: &str = "flowscope-image-pull-probe";
const PROBE_IMAGE: &str = "busybox:1.36";

/// Run the image-pull probe and clean up its artifacts.
pub async fn check(client: &dyn ClusterClient, config: &CheckConfig) -> CheckResult {
    let outcome = run_probe(client, config).await;
    cleanup(client, config).await;

    match outcome {
        Ok(()) => CheckResult::pass("cluster can pull flowscope images", CATEGORY),
        Err(detail) => CheckResult::fail("cluster can pull flowscope images", CATEGORY, detail),
    }
}

async fn run_probe(client: &dyn ClusterClient, config: &CheckConfig) -> Result<(), String> {
    // Namespace-restricted installs assume the namespace already exists;
    // cluster-wide ones create (and later remove) it.
    if config.permission_scope() == PermissionScope::ClusterWide {
        client
            .create_namespace(&config.namespace)
            .await
            .map_err(|e| format!("error creating probe namespace: {e}"))?;
    }

    client
        .create_pod(&config.namespace, probe_pod())
        .await
        .map_err(|e| format!("error creating probe pod: {e}"))?;

    let pattern = Regex::new(&format!("^{PROBE_POD_NAME}$"))
        .map_err(|e| format!("bad probe pod pattern: {e}"))?;
    let watch = client
        .watch_pods(&config.namespace, &pattern)
        .await
        .map_err(|e| format!("error watching probe pod: {e}"))?;

    match readiness::wait_until_running(watch, config.watch_deadline).await {
        WatchOutcome::Succeeded => Ok(()),
        WatchOutcome::TimedOut => Err("image not pulled in time".to_string()),
        WatchOutcome::WatchError(e) => Err(format!("watch failed: {e}")),
    }
}

/// Best-effort removal of everything the probe created.
async fn cleanup(client: &dyn ClusterClient, config: &CheckConfig) {
    if let Err(e) = client.delete_pod(&config.namespace, PROBE_POD_NAME).await {
        debug!(error = %e, "error removing image pull probe pod");
    }

    if config.permission_scope() == PermissionScope::ClusterWide {
        if let Err(e) = client.delete_namespace(&config.namespace).await {
            debug!(error = %e, "error removing image pull probe namespace");
        }
    }
}

fn probe_pod() -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(PROBE_POD_NAME.to_string()),
            ..ObjectMeta::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "probe".to_string(),
                image: Some(PROBE_IMAGE.to_string()),
                image_pull_policy: Some("Always".to_string()),
                command: Some(vec!["cat".to_string()]),
                stdin: Some(true),
                ..Container::default()
            }],
            termination_grace_period_seconds: Some(0),
            ..PodSpec::default()
        }),
        ..Pod::default()
    }
}
