//! Flowscope CLI.
//!
//! Command-line interface for operating flowscope in a Kubernetes
//! cluster, starting with installation health checks.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flowscope_cli::commands::check::CheckCommand;

/// Flowscope - Kubernetes API traffic capture.
#[derive(Parser)]
#[command(
    name = "flowscope",
    version,
    about = "Flowscope cluster tooling",
    long_about = "Operate flowscope in a Kubernetes cluster.\n\n\
                  The check command diagnoses an installation: before\n\
                  installing it verifies permissions and image pullability,\n\
                  after installing it verifies the deployed resources and\n\
                  hub connectivity."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the health of a flowscope installation.
    ///
    /// Runs the gated check sequence: API reachability, version
    /// compatibility, then the pre- or post-installation branch.
    Check(CheckCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("info,flowscope_kube=debug,flowscope_cli=debug")
    } else {
        EnvFilter::new("warn,flowscope_kube=info,flowscope_cli=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Check(cmd) => cmd.run().await,
    }
}
