//! Periodic maintenance: zombie reaping, status snapshot, retention

use super::status::StatusWriter;
use super::{SharedSupervisor, lock_supervisor};
use agent_deploy_core::StateStore;
use agent_deploy_core::config::RetentionConfig;
use agent_deploy_core::retention::apply_retention;
use anyhow::Result;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Run one maintenance pass. Blocking.
///
/// Reaps zombies, refreshes every tracked agent's health (which reconciles
/// exits into the durable records), writes the coordinator status file and
/// finally drops agents whose exit has been recorded.
pub fn maintenance_tick(supervisor: &SharedSupervisor, writer: &StatusWriter) -> Result<()> {
    let mut sup = lock_supervisor(supervisor);
    let reaped = sup.reap_zombies();
    if !reaped.is_empty() {
        info!("Reaped {} zombie agent(s): {}", reaped.len(), reaped.join(", "));
    }
    let summary = sup.summary();
    debug!(
        total = summary.total,
        running = summary.running,
        zombie = summary.zombie,
        completed = summary.completed,
        failed = summary.failed,
        "maintenance summary"
    );
    let forgotten = sup.forget_exited();
    drop(sup);

    writer.write(summary, true)?;
    if !forgotten.is_empty() {
        debug!("Stopped tracking {} exited agent(s)", forgotten.len());
    }
    Ok(())
}

/// Run maintenance every `period` until cancelled.
pub async fn maintenance_loop(
    supervisor: SharedSupervisor,
    writer: StatusWriter,
    store: StateStore,
    retention: RetentionConfig,
    period: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    info!("Starting maintenance loop (interval: {:?})", period);
    let writer = std::sync::Arc::new(writer);
    let retention_every = Duration::from_secs(retention.interval_secs.max(1));
    let mut last_retention: Option<Instant> = None;
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sup = supervisor.clone();
                let w = writer.clone();
                match tokio::task::spawn_blocking(move || maintenance_tick(&sup, &w)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Maintenance pass failed: {:#}", e),
                    Err(e) => error!("Maintenance task panicked: {}", e),
                }

                let due = last_retention.is_none_or(|at| at.elapsed() >= retention_every);
                if retention.enabled && due {
                    last_retention = Some(Instant::now());
                    let store = store.clone();
                    let policy = retention.clone();
                    let swept = tokio::task::spawn_blocking(move || {
                        apply_retention(&store, &policy, false)
                    })
                    .await;
                    match swept {
                        Ok(Ok(result)) if result.removed > 0 || result.exchanges_removed > 0 => {
                            info!(
                                "Retention removed {} record(s) and {} exchange(s)",
                                result.removed, result.exchanges_removed
                            )
                        }
                        Ok(Ok(_)) => debug!("Retention: nothing to remove"),
                        Ok(Err(e)) => error!("Retention sweep failed: {:#}", e),
                        Err(e) => error!("Retention task panicked: {}", e),
                    }
                }
            }
            _ = cancel.cancelled() => {
                info!("Maintenance loop cancelled");
                break;
            }
        }
    }

    Ok(())
}
