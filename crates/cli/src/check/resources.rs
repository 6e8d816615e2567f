//! Installed-resource existence checks.
//!
//! Walks a fixed, ordered catalog of the objects an installation places in
//! the cluster. Every entry is checked and reported even when an earlier
//! one fails, so the operator sees the complete picture in one run.

use flowscope_kube::{
    is_pod_running, ClusterClient, ClusterError, CLUSTER_ROLE_BINDING_NAME, CLUSTER_ROLE_NAME,
    CONFIG_MAP_NAME, HUB_NAME, ROLE_BINDING_NAME, ROLE_NAME, SERVICE_ACCOUNT_NAME, WORKER_NAME,
};

use crate::check::report::CheckResult;
use crate::config::{CheckConfig, PermissionScope};

const CATEGORY: &str = "k8s-components";

/// Check the full resource catalog for the configured namespace.
pub async fn check_all(client: &dyn ClusterClient, config: &CheckConfig) -> Vec<CheckResult> {
    let ns = config.namespace.as_str();
    let mut results = Vec::new();

    results.push(existence(
        client.namespace_exists(ns).await,
        ns,
        "namespace",
    ));
    results.push(existence(
        client.config_map_exists(ns, CONFIG_MAP_NAME).await,
        CONFIG_MAP_NAME,
        "config map",
    ));
    results.push(existence(
        client.service_account_exists(ns, SERVICE_ACCOUNT_NAME).await,
        SERVICE_ACCOUNT_NAME,
        "service account",
    ));

    match config.permission_scope() {
        PermissionScope::NamespaceRestricted => {
            results.push(existence(
                client.role_exists(ns, ROLE_NAME).await,
                ROLE_NAME,
                "role",
            ));
            results.push(existence(
                client.role_binding_exists(ns, ROLE_BINDING_NAME).await,
                ROLE_BINDING_NAME,
                "role binding",
            ));
        }
        PermissionScope::ClusterWide => {
            results.push(existence(
                client.cluster_role_exists(CLUSTER_ROLE_NAME).await,
                CLUSTER_ROLE_NAME,
                "cluster role",
            ));
            results.push(existence(
                client
                    .cluster_role_binding_exists(CLUSTER_ROLE_BINDING_NAME)
                    .await,
                CLUSTER_ROLE_BINDING_NAME,
                "cluster role binding",
            ));
        }
    }

    results.push(existence(
        client.service_exists(ns, HUB_NAME).await,
        HUB_NAME,
        "service",
    ));

    results.push(check_hub_pod(client, ns).await);
    results.push(check_worker_pods(client, ns).await);

    results
}

/// Convert an existence query outcome into a result, keeping query errors
/// distinguishable from plain absence.
fn existence(outcome: Result<bool, ClusterError>, name: &str, kind: &str) -> CheckResult {
    let subject = format!("{kind} '{name}'");
    match outcome {
        Ok(true) => CheckResult::pass(subject, CATEGORY),
        Ok(false) => CheckResult::fail(subject, CATEGORY, format!("{kind} '{name}' doesn't exist")),
        Err(e) => CheckResult::fail(
            subject,
            CATEGORY,
            format!("error checking {kind} '{name}': {e}"),
        ),
    }
}

async fn check_hub_pod(client: &dyn ClusterClient, namespace: &str) -> CheckResult {
    let subject = format!("pod '{HUB_NAME}'");
    match client.list_pods_by_label(namespace, HUB_NAME).await {
        Err(e) => CheckResult::fail(
            subject,
            CATEGORY,
            format!("error checking if '{HUB_NAME}' pod is running: {e}"),
        ),
        Ok(pods) if pods.is_empty() => CheckResult::fail(
            subject,
            CATEGORY,
            format!("'{HUB_NAME}' pod doesn't exist"),
        ),
        Ok(pods) if !is_pod_running(&pods[0]) => CheckResult::fail(
            subject,
            CATEGORY,
            format!("'{HUB_NAME}' pod not running"),
        ),
        Ok(_) => CheckResult::pass(subject, CATEGORY),
    }
}

async fn check_worker_pods(client: &dyn ClusterClient, namespace: &str) -> CheckResult {
    let subject = format!("pods '{WORKER_NAME}'");
    match client.list_pods_by_label(namespace, WORKER_NAME).await {
        Err(e) => CheckResult::fail(
            subject,
            CATEGORY,
            format!("error checking if '{WORKER_NAME}' pods are running: {e}"),
        ),
        Ok(pods) => {
            let total = pods.len();
            // An empty worker set means the deployment is missing; reporting
            // 0/0 as healthy would hide that.
            if total == 0 {
                return CheckResult::fail(subject, CATEGORY, "no worker pods found");
            }

            let not_running = pods.iter().filter(|p| !is_pod_running(p)).count();
            if not_running > 0 {
                CheckResult::fail(
                    subject,
                    CATEGORY,
                    format!("{not_running}/{total} pods are not running"),
                )
            } else {
                CheckResult::pass(subject, CATEGORY).with_detail(format!("{total} pods running"))
            }
        }
    }
}
