//! adc-coordinator - watches a deployment root and supervises agent processes

use agent_deploy_coordinator::coordinator;
use agent_deploy_core::DeploymentLayout;
use agent_deploy_core::config::{ConfigOverrides, resolve_config};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Deployment coordinator: turns request files into supervised agent processes
#[derive(Parser, Debug)]
#[command(name = "adc-coordinator")]
#[command(about = "Watch a deployment root and supervise agent processes")]
#[command(version)]
struct Args {
    /// Path to configuration file (replaces config discovery)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Deployment root directory
    #[arg(long, value_name = "DIR")]
    deployment_dir: Option<PathBuf>,

    /// Default agent program
    #[arg(long, value_name = "PROGRAM")]
    agent_program: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = args.verbose.then_some(tracing::Level::DEBUG);
    agent_deploy_core::logging::init_with_level(level);

    info!("adc-coordinator {} starting...", env!("CARGO_PKG_VERSION"));

    let home_dir = agent_deploy_core::home::get_home_dir()
        .context("Failed to determine home directory")?;
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;

    let overrides = ConfigOverrides {
        config_path: args.config.clone(),
        deployment_dir: args.deployment_dir.clone(),
        agent_program: args.agent_program.clone(),
    };
    let config = resolve_config(&overrides, &current_dir, &home_dir)
        .context("Failed to resolve configuration")?;
    if let Some(path) = &args.config {
        info!("Loaded config from: {}", path.display());
    }

    let layout = DeploymentLayout::new(config.deployment_root(&home_dir));

    let cancel_token = CancellationToken::new();
    let cancel_for_signals = cancel_token.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        cancel_for_signals.cancel();
    });

    coordinator::run(config, layout, Some(home_dir), cancel_token)
        .await
        .context("Coordinator loop failed")?;

    info!("adc-coordinator shutdown complete");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                if let Err(e) = ctrl_c.await {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = ctrl_c.await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Received Ctrl+C");
    }
}
