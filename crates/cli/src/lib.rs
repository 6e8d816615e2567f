//! Flowscope CLI Library.
//!
//! Programmatic access to the flowscope installation health checks, so the
//! check engine can be driven from other crates as well as from the
//! `flowscope` binary.
//!
//! # Example
//!
//! ```ignore
//! use flowscope_cli::{run_checks, CheckConfig, CheckMode};
//! use flowscope_kube::KubeCluster;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CheckConfig::with_defaults(CheckMode::PostInstallation);
//!     let cluster = KubeCluster::connect(None, None).await?;
//!     let report = run_checks(&cluster, &config).await;
//!     report.print_summary();
//!     Ok(())
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

pub mod check;
pub mod commands;
pub mod config;
pub mod ui;

// Re-export commonly used types at the crate root
pub use check::{run_checks, CheckReport, CheckResult};
pub use config::{CheckConfig, CheckMode, PermissionScope};
