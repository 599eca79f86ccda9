//! # Command Line Interface
//!
//! `dsm` provisions senhasegura DSM secrets for Kubernetes workloads and CI/CD
//! pipelines. This layer parses flags, loads settings and decides the exit
//! status; everything else lives in the library.

pub mod inject;
pub mod kubernetes;
pub mod runb;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AgentSettings;
use crate::observability::{init_logging, log_settings_info};

#[derive(Parser)]
#[command(name = "dsm")]
#[command(about = "A command line interface to interact with senhasegura DSM API")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default is $HOME/.config.yaml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Kubernetes secret provisioning
    Kubernetes {
        #[command(subcommand)]
        command: kubernetes::KubernetesCommands,
    },

    /// Running Belt plugin to inject secrets into CI/CD pipelines
    Runb(runb::RunbArgs),
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.json_logs);

    let settings =
        AgentSettings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    log_settings_info(&settings);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    match cli.command {
        Commands::Kubernetes { command } => {
            kubernetes::handle_kubernetes_command(command, &settings, shutdown).await?
        }
        Commands::Runb(args) => runb::handle_runb(args, &settings).await?,
    }

    Ok(())
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
        }
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    token.cancel();
}
