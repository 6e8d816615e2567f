//! Hub connectivity verification.
//!
//! Tries a direct connection first; when that fails, both tunnel
//! strategies are attempted unconditionally (the operator wants to know
//! which transports work, not just whether one does). Each tunnel is torn
//! down whether or not its probe succeeded; teardown failures are logged
//! and never affect the verdict. The stage passes if any strategy reached
//! the hub.

use std::fmt;
use std::time::Duration;

use flowscope_kube::{ClusterClient, HUB_NAME};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::check::report::CheckResult;
use crate::config::CheckConfig;

const CATEGORY: &str = "hub-connectivity";

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Transport strategy of a single connectivity attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Direct,
    Proxy,
    PortForward,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Proxy => write!(f, "proxy"),
            Self::PortForward => write!(f, "port-forward"),
        }
    }
}

/// One transport attempt. Transient: folded into the stage result and
/// discarded.
struct Attempt {
    strategy: Strategy,
    endpoint: String,
    outcome: Result<(), String>,
}

/// An HTTP probe against the hub's echo endpoint with a fixed retry and
/// per-attempt timeout budget.
pub struct ApiProbe {
    client: reqwest::Client,
    retries: u32,
}

impl ApiProbe {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(retries: u32, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            client,
            retries: retries.max(1),
        })
    }

    /// Probe `base_url` until it answers or the retry budget is spent.
    ///
    /// # Errors
    ///
    /// Returns the last failure when every attempt failed.
    pub async fn test_connection(&self, base_url: &str) -> Result<(), String> {
        let url = format!("{base_url}/echo");
        let mut last_failure = String::new();

        for attempt in 1..=self.retries {
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => last_failure = format!("unexpected status {}", resp.status()),
                Err(e) => last_failure = e.to_string(),
            }
            debug!(url, attempt, failure = %last_failure, "hub probe attempt failed");
            if attempt < self.retries {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        Err(last_failure)
    }
}

/// Verify hub reachability, producing a single stage result.
pub async fn verify(client: &dyn ClusterClient, config: &CheckConfig) -> CheckResult {
    let mut attempts = Vec::new();

    let direct = attempt_direct(config).await;
    let direct_ok = direct.outcome.is_ok();
    attempts.push(direct);

    if !direct_ok {
        // Both tunnels run even if the first succeeds, so the operator
        // learns which transports are viable.
        attempts.push(attempt_proxy(client, config).await);
        attempts.push(attempt_port_forward(client, config).await);
    }

    fold(&attempts)
}

async fn attempt_direct(config: &CheckConfig) -> Attempt {
    let endpoint = config.hub_url();
    let outcome = match ApiProbe::new(config.direct_retries, config.probe_timeout) {
        Ok(probe) => probe.test_connection(&endpoint).await,
        Err(e) => Err(e),
    };
    log_attempt(Strategy::Direct, &endpoint, &outcome);
    Attempt {
        strategy: Strategy::Direct,
        endpoint,
        outcome,
    }
}

async fn attempt_proxy(client: &dyn ClusterClient, config: &CheckConfig) -> Attempt {
    let requested = config.hub_url();

    let tunnel = match client
        .start_proxy(
            &config.proxy_host,
            config.gui_port,
            &config.namespace,
            HUB_NAME,
            config.gui_port,
        )
        .await
    {
        Ok(tunnel) => tunnel,
        Err(e) => {
            let outcome = Err(e.to_string());
            log_attempt(Strategy::Proxy, &requested, &outcome);
            return Attempt {
                strategy: Strategy::Proxy,
                endpoint: requested,
                outcome,
            };
        }
    };

    let endpoint = tunnel.url().to_string();
    let outcome = probe_through(config, &endpoint).await;
    if let Err(e) = tunnel.close().await {
        warn!(error = %e, "error while stopping proxy tunnel");
    }
    log_attempt(Strategy::Proxy, &endpoint, &outcome);
    Attempt {
        strategy: Strategy::Proxy,
        endpoint,
        outcome,
    }
}

async fn attempt_port_forward(client: &dyn ClusterClient, config: &CheckConfig) -> Attempt {
    let pattern = match Regex::new(&format!("^{HUB_NAME}")) {
        Ok(p) => p,
        Err(e) => {
            return Attempt {
                strategy: Strategy::PortForward,
                endpoint: String::new(),
                outcome: Err(e.to_string()),
            }
        }
    };

    let tunnel = match client
        .start_port_forward(&config.namespace, &pattern, config.gui_port)
        .await
    {
        Ok(tunnel) => tunnel,
        Err(e) => {
            let outcome = Err(e.to_string());
            log_attempt(Strategy::PortForward, "", &outcome);
            return Attempt {
                strategy: Strategy::PortForward,
                endpoint: String::new(),
                outcome,
            };
        }
    };

    let endpoint = tunnel.url().to_string();
    let outcome = probe_through(config, &endpoint).await;
    if let Err(e) = tunnel.close().await {
        warn!(error = %e, "error while stopping port-forward tunnel");
    }
    log_attempt(Strategy::PortForward, &endpoint, &outcome);
    Attempt {
        strategy: Strategy::PortForward,
        endpoint,
        outcome,
    }
}

async fn probe_through(config: &CheckConfig, endpoint: &str) -> Result<(), String> {
    let probe = ApiProbe::new(config.tunnel_retries, config.probe_timeout)?;
    probe.test_connection(endpoint).await
}

fn log_attempt(strategy: Strategy, endpoint: &str, outcome: &Result<(), String>) {
    match outcome {
        Ok(()) => info!(%strategy, endpoint, "connected to hub"),
        Err(e) => info!(%strategy, endpoint, failure = %e, "couldn't connect to hub"),
    }
}

/// Collapse the attempts into the stage's single result.
fn fold(attempts: &[Attempt]) -> CheckResult {
    let subject = "hub reachable";

    if let Some(winner) = attempts.iter().find(|a| a.outcome.is_ok()) {
        return CheckResult::pass(subject, CATEGORY)
            .with_detail(format!("connected via {}", winner.strategy));
    }

    let failures: Vec<String> = attempts
        .iter()
        .filter_map(|a| {
            a.outcome
                .as_ref()
                .err()
                .map(|e| format!("{}: {e}", a.strategy))
        })
        .collect();

    CheckResult::fail(subject, CATEGORY, failures.join("; "))
}
