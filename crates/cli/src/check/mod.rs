//! Installation health checks.
//!
//! The orchestrator runs stages strictly in order and gates each stage on
//! the previous one: API reachability, version compatibility, then either
//! the pre-installation branch (permissions, image pull) or the
//! post-installation branch (resource existence, hub connectivity). Checks
//! *within* a stage never short-circuit each other; a failed stage stops
//! later stages but its own results are all recorded.

pub mod connectivity;
pub mod image_pull;
pub mod permissions;
pub mod readiness;
pub mod report;
pub mod resources;

#[cfg(test)]
pub(crate) mod testing;

pub use report::{CheckReport, CheckResult};

use flowscope_kube::ClusterClient;
use tracing::info;

use crate::config::{CheckConfig, CheckMode};

const API_CATEGORY: &str = "kubernetes-api";
const VERSION_CATEGORY: &str = "kubernetes-version";

/// Run the full gated check sequence and collect an ordered report.
pub async fn run_checks(client: &dyn ClusterClient, config: &CheckConfig) -> CheckReport {
    let mut report = CheckReport::new(config.mode, &config.namespace);
    info!(mode = %config.mode, namespace = %config.namespace, "running installation checks");

    // Stage: API reachability. Failure is fatal to the remaining run.
    let version = match client.server_version().await {
        Ok(version) => {
            report.record(
                CheckResult::pass("can query the Kubernetes API", API_CATEGORY)
                    .with_detail(format!("server version {version}")),
            );
            version
        }
        Err(e) => {
            report.record(CheckResult::fail(
                "can query the Kubernetes API",
                API_CATEGORY,
                e.to_string(),
            ));
            return report;
        }
    };

    // Stage: version compatibility. Also fatal when failing.
    if version.is_supported() {
        report.record(CheckResult::pass(
            "running a supported Kubernetes version",
            VERSION_CATEGORY,
        ));
    } else {
        report.record(CheckResult::fail(
            "running a supported Kubernetes version",
            VERSION_CATEGORY,
            format!(
                "server {version} is below the minimum supported {}",
                flowscope_kube::MINIMUM_VERSION
            ),
        ));
        return report;
    }

    match config.mode {
        CheckMode::PreInstallation => {
            let rules = match permissions::rules_for(config.permission_scope()) {
                Ok(rules) => rules,
                Err(e) => {
                    report.record(CheckResult::fail(
                        "permission rules manifest",
                        "kubernetes-permissions",
                        format!("error loading permission rules: {e}"),
                    ));
                    return report;
                }
            };

            let results = permissions::verify(client, &config.namespace, &rules).await;
            let stage_passed = results.iter().all(|r| r.passed);
            report.record_all(results);
            if !stage_passed {
                return report;
            }

            report.record(image_pull::check(client, config).await);
        }
        CheckMode::PostInstallation => {
            let results = resources::check_all(client, config).await;
            let stage_passed = results.iter().all(|r| r.passed);
            report.record_all(results);
            if !stage_passed {
                return report;
            }

            report.record(connectivity::verify(client, config).await);
        }
    }

    report
}
