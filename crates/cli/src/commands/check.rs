//! Check command - installation health checks.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use flowscope_kube::{KubeCluster, DEFAULT_NAMESPACE};

use crate::check::{self, CheckReport, CheckResult};
use crate::config::{CheckConfig, CheckMode};

/// Check the flowscope installation in a cluster.
#[derive(Args)]
pub struct CheckCommand {
    /// Check install prerequisites instead of an existing installation.
    #[arg(long)]
    pre_install: bool,

    /// Namespace the installation lives in (or will live in).
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Path to kubeconfig file.
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kube context to use instead of the current one.
    #[arg(long)]
    kube_context: Option<String>,

    /// Port the hub's GUI/API listens on.
    #[arg(long, default_value = "8899")]
    gui_port: u16,

    /// Host the direct connection and tunnels bind to.
    #[arg(long, default_value = "127.0.0.1")]
    proxy_host: String,

    /// Output report as JSON.
    #[arg(long, default_value = "false")]
    json: bool,
}

impl CheckCommand {
    /// Run the check command.
    ///
    /// # Errors
    ///
    /// Returns an error when any check fails, so the process exit code
    /// reflects the verdict.
    pub async fn run(&self) -> Result<()> {
        let config = self.to_config();
        info!(mode = %config.mode, namespace = %config.namespace, "checking installation");

        let report = match KubeCluster::connect(
            config.kubeconfig.as_deref(),
            config.kube_context.as_deref(),
        )
        .await
        {
            Ok(cluster) => check::run_checks(&cluster, &config).await,
            Err(e) => {
                // No client means nothing else can run; report the single
                // failure the same way any check result is reported.
                let mut report = CheckReport::new(config.mode, &config.namespace);
                report.record(CheckResult::fail(
                    "can initialize the client",
                    "kubernetes-api",
                    e.to_string(),
                ));
                report
            }
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            report.print_summary();
        }

        if report.all_passed() {
            Ok(())
        } else {
            anyhow::bail!("{} of {} checks failed", report.failed_count(), report.total())
        }
    }

    fn to_config(&self) -> CheckConfig {
        let mode = if self.pre_install {
            CheckMode::PreInstallation
        } else {
            CheckMode::PostInstallation
        };

        let mut config = CheckConfig::with_defaults(mode);
        config.namespace = self.namespace.clone();
        config.kubeconfig = self.kubeconfig.clone();
        config.kube_context = self.kube_context.clone();
        config.gui_port = self.gui_port;
        config.proxy_host = self.proxy_host.clone();
        config
    }
}
