//! Main coordinator loop

use super::maintenance::maintenance_loop;
use super::recovery::report_recovery;
use super::status::StatusWriter;
use super::watcher::{RequestWatcher, watch_requests};
use super::{SharedSupervisor, lock_supervisor, new_shared_supervisor};
use crate::supervisor::{Supervisor, TerminationOutcome};
use agent_deploy_core::config::Config;
use agent_deploy_core::{DeploymentLayout, StateStore};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the coordinator until `cancel` fires.
///
/// 1. Creates the deployment root layout
/// 2. Logs the recovery summary (incomplete agents are never respawned)
/// 3. Starts the request watcher and the maintenance loop
/// 4. On cancellation, stops both and terminates every tracked agent
pub async fn run(
    config: Config,
    layout: DeploymentLayout,
    home_dir: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<()> {
    info!("Deployment root: {}", layout.root().display());
    layout.ensure().context("Failed to create deployment root")?;

    let store = StateStore::new(layout.clone());
    if let Err(e) = report_recovery(&store) {
        error!("Failed to build recovery summary: {}", e);
    }

    let supervisor = new_shared_supervisor(Supervisor::new(
        layout.clone(),
        config.clone(),
        home_dir.as_deref(),
    ));

    let watcher = RequestWatcher::new(layout.clone(), supervisor.clone());
    let poll_interval = Duration::from_millis(config.watcher.poll_interval_ms.max(10));
    let watcher_cancel = cancel.clone();
    let watcher_task = tokio::spawn(async move {
        if let Err(e) = watch_requests(watcher, poll_interval, watcher_cancel.clone()).await {
            error!("Request watcher failed: {:#}", e);
            // without a watcher no request will ever be answered
            watcher_cancel.cancel();
        }
    });

    let writer = StatusWriter::new(
        layout.coordinator_status_path(),
        layout.root(),
        env!("CARGO_PKG_VERSION"),
    );
    let maintenance_task = tokio::spawn(maintenance_loop(
        supervisor.clone(),
        writer,
        store,
        config.retention.clone(),
        Duration::from_secs(config.supervisor.maintenance_interval_secs.max(1)),
        cancel.clone(),
    ));

    info!("Coordinator running. Waiting for cancellation signal...");
    cancel.cancelled().await;
    info!("Cancellation signal received. Beginning shutdown...");

    if tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, watcher_task).await.is_err() {
        warn!("Watcher task did not complete in time");
    }
    match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, maintenance_task).await {
        Ok(Ok(Err(e))) => error!("Maintenance loop failed: {:#}", e),
        Err(_) => warn!("Maintenance task did not complete in time"),
        _ => {}
    }

    shutdown(&supervisor, &layout).await;
    info!("Coordinator shutdown complete");
    Ok(())
}

/// Terminate every tracked agent and write the final status snapshot.
pub async fn shutdown(supervisor: &SharedSupervisor, layout: &DeploymentLayout) {
    let sup = supervisor.clone();
    let outcomes =
        tokio::task::spawn_blocking(move || lock_supervisor(&sup).terminate_all(false)).await;
    match outcomes {
        Ok(outcomes) => {
            let survived = outcomes
                .iter()
                .filter(|(_, outcome)| *outcome == TerminationOutcome::Survived)
                .count();
            info!(
                "Terminated {} agent(s) on shutdown ({} survived)",
                outcomes.len(),
                survived
            );
        }
        Err(e) => error!("Shutdown termination task panicked: {}", e),
    }

    let writer = StatusWriter::new(
        layout.coordinator_status_path(),
        layout.root(),
        env!("CARGO_PKG_VERSION"),
    );
    let summary = lock_supervisor(supervisor).summary();
    if let Err(e) = writer.write(summary, false) {
        warn!("Failed to write final coordinator status: {:#}", e);
    }
}
