//! RBAC permission verification.
//!
//! The installer ships two permission-rule documents: a namespaced Role for
//! namespace-restricted installs and a ClusterRole for cluster-wide ones.
//! The verifier expands every rule into its full (group, resource, verb)
//! cross-product and issues one self-subject access review per tuple, so
//! the operator sees exactly which capability is missing.

use flowscope_kube::ClusterClient;

use crate::check::report::CheckResult;
use crate::config::PermissionScope;

const CATEGORY: &str = "kubernetes-permissions";

const NS_RULES_YAML: &str = include_str!("rules/permissions-ns.yaml");
const CLUSTER_RULES_YAML: &str = include_str!("rules/permissions-cluster.yaml");

/// A policy rule from the embedded manifests.
///
/// Each (group, resource, verb) combination is an independent permission
/// check; duplicates across rules are checked again rather than deduplicated
/// (the query is idempotent and side-effect-free).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

impl PolicyRule {
    /// Number of (group, resource, verb) tuples this rule expands to.
    #[must_use]
    pub fn tuple_count(&self) -> usize {
        self.api_groups.len() * self.resources.len() * self.verbs.len()
    }
}

/// Load the policy rules for the given installation scope.
///
/// The scope is resolved once from configuration; which document backs it
/// is decided here at load time, not by inspecting object kinds at runtime.
///
/// # Errors
///
/// Returns an error if the embedded manifest cannot be parsed.
pub fn rules_for(scope: PermissionScope) -> Result<Vec<PolicyRule>, serde_yaml::Error> {
    let raw_rules = match scope {
        PermissionScope::NamespaceRestricted => {
            let role: k8s_openapi::api::rbac::v1::Role = serde_yaml::from_str(NS_RULES_YAML)?;
            role.rules.unwrap_or_default()
        }
        PermissionScope::ClusterWide => {
            let role: k8s_openapi::api::rbac::v1::ClusterRole =
                serde_yaml::from_str(CLUSTER_RULES_YAML)?;
            role.rules.unwrap_or_default()
        }
    };

    Ok(raw_rules
        .into_iter()
        .map(|rule| PolicyRule {
            api_groups: rule.api_groups.unwrap_or_default(),
            resources: rule.resources.unwrap_or_default(),
            verbs: rule.verbs,
        })
        .collect())
}

/// Check every (group, resource, verb) tuple of every rule.
///
/// Failures do not stop later tuples; the caller gets one result per tuple.
pub async fn verify(
    client: &dyn ClusterClient,
    namespace: &str,
    rules: &[PolicyRule],
) -> Vec<CheckResult> {
    let mut results = Vec::new();

    for rule in rules {
        for group in &rule.api_groups {
            for resource in &rule.resources {
                for verb in &rule.verbs {
                    let subject = tuple_subject(group, resource, verb);
                    let result = match client.can_i(namespace, resource, verb, group).await {
                        Ok(true) => CheckResult::pass(subject, CATEGORY),
                        Ok(false) => CheckResult::fail(
                            subject,
                            CATEGORY,
                            format!("not permitted to {verb} {resource} in group '{group}'"),
                        ),
                        Err(e) => CheckResult::fail(
                            subject,
                            CATEGORY,
                            format!("permission query failed: {e}"),
                        ),
                    };
                    results.push(result);
                }
            }
        }
    }

    results
}

fn tuple_subject(group: &str, resource: &str, verb: &str) -> String {
    if group.is_empty() {
        format!("can {verb} {resource}")
    } else {
        format!("can {verb} {resource} in group '{group}'")
    }
}
