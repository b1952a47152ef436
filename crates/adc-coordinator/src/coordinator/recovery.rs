//! Startup recovery report
//!
//! Agents whose last persisted status is PENDING, SPAWNING or RUNNING lost
//! their supervising process when the previous coordinator exited. They are
//! reported and left as they are: never respawned, never failed
//! automatically. `adc recovery` gives the operator the tools to act.

use agent_deploy_core::io::StoreError;
use agent_deploy_core::{RecoverySummary, StateStore};
use tracing::{info, warn};

/// Log the recovery set of `store` and return it.
pub fn report_recovery(store: &StateStore) -> Result<RecoverySummary, StoreError> {
    let summary = store.recovery_summary()?;
    if summary.is_empty() {
        info!("No incomplete agents from a previous run");
        return Ok(summary);
    }

    warn!(
        total = summary.total_incomplete,
        "Found {} incomplete agent(s) from a previous run; they will not be respawned",
        summary.total_incomplete
    );
    for (status, count) in &summary.by_status {
        info!("  by status: {} = {}", status, count);
    }
    for (agent_type, count) in &summary.by_type {
        info!("  by type: {} = {}", agent_type, count);
    }
    for agent in &summary.agents {
        info!(
            agent_id = %agent.agent_id,
            status = %agent.status,
            pid = ?agent.pid,
            "  incomplete agent"
        );
    }
    Ok(summary)
}
