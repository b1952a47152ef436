//! List command implementation

use agent_deploy_core::DeploymentClient;
use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::util::context::{CliContext, GlobalArgs};
use crate::util::format::or_dash;

/// List agent status snapshots
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only agents deployed by this parent
    #[arg(long)]
    parent: Option<String>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the list command
pub fn execute(global: &GlobalArgs, args: ListArgs) -> Result<()> {
    let ctx = CliContext::resolve(global)?;

    let snapshots = match &args.parent {
        Some(parent) => DeploymentClient::new(ctx.layout.clone(), parent.clone()).list_mine()?,
        None => DeploymentClient::new(ctx.layout.clone(), "cli").list_all()?,
    };
    let records = ctx.store().list_all()?;

    if args.json {
        let agents: Vec<_> = snapshots
            .iter()
            .map(|s| {
                json!({
                    "agent_id": s.agent_id,
                    "parent_agent_id": s.parent_agent_id,
                    "reported_status": s.status,
                    "progress": s.progress,
                    "pid": s.pid,
                    "lifecycle_status": records.get(&s.agent_id).map(|r| r.status),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "agents": agents }))?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No agents found");
        return Ok(());
    }

    println!(
        "{:<20} {:<16} {:<10} {:<10} {:>8} {:>9}",
        "Agent", "Parent", "Lifecycle", "Reported", "PID", "Progress"
    );
    println!("{}", "─".repeat(78));
    for snapshot in &snapshots {
        let lifecycle = records.get(&snapshot.agent_id).map(|r| r.status.as_str());
        println!(
            "{:<20} {:<16} {:<10} {:<10} {:>8} {:>8}%",
            snapshot.agent_id,
            or_dash(snapshot.parent_agent_id.as_deref()),
            or_dash(lifecycle),
            snapshot.status,
            or_dash(snapshot.pid),
            snapshot.progress
        );
    }
    Ok(())
}
