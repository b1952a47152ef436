//! Status command implementation

use agent_deploy_core::DeploymentClient;
use anyhow::{Result, bail};
use clap::Args;
use serde_json::json;

use crate::util::context::{CliContext, GlobalArgs};
use crate::util::format::{format_age, or_dash};

/// Show one agent's status snapshot and lifecycle record
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Agent id
    agent_id: String,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the status command
pub fn execute(global: &GlobalArgs, args: StatusArgs) -> Result<()> {
    let ctx = CliContext::resolve(global)?;
    let client = DeploymentClient::new(ctx.layout.clone(), "cli");

    let snapshot = client.get_status(&args.agent_id)?;
    let record = ctx.store().load(&args.agent_id)?;
    if snapshot.is_none() && record.is_none() {
        bail!("Agent '{}' not found in {}", args.agent_id, ctx.layout.root().display());
    }

    if args.json {
        let output = json!({
            "agent_id": args.agent_id,
            "status_file": snapshot,
            "state": record,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let now = chrono::Utc::now();
    println!("Agent: {}", args.agent_id);
    if let Some(record) = &record {
        println!();
        println!("Lifecycle");
        println!("  Status:    {}", record.status);
        println!("  Name:      {}", record.agent_name);
        println!("  Type:      {}", record.agent_type);
        println!("  Parent:    {}", record.parent_agent_id);
        println!("  Model:     {}", or_dash(record.model.as_deref()));
        println!("  PID:       {}", or_dash(record.pid));
        println!("  Progress:  {}%", record.progress);
        if let Some(message) = &record.progress_message {
            println!("  Message:   {message}");
        }
        println!("  Exit code: {}", or_dash(record.exit_code));
        if let Some(error) = &record.error {
            println!("  Error:     {error}");
        }
        println!("  Updated:   {} ago", format_age(record.last_updated, now));
        if let Some(finished) = record.finished_at() {
            println!("  Finished:  {}", finished.to_rfc3339());
        }
    }
    if let Some(snapshot) = &snapshot {
        println!();
        println!("Reported by agent");
        println!("  Status:    {}", snapshot.status);
        println!("  Progress:  {}%", snapshot.progress);
        for (key, value) in &snapshot.unknown_fields {
            println!("  {key}: {value}");
        }
    }
    Ok(())
}
