//! Recovery command implementation
//!
//! Agents whose durable status is still PENDING, SPAWNING or RUNNING after a
//! coordinator restart have no supervising process. The coordinator only
//! reports them; this command is how an operator inspects and clears them.

use agent_deploy_core::StateStore;
use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use crate::util::context::{CliContext, GlobalArgs};
use crate::util::format::{format_age, or_dash};

#[derive(Args, Debug)]
pub struct RecoveryArgs {
    #[command(subcommand)]
    command: RecoveryCommand,
}

#[derive(Subcommand, Debug)]
enum RecoveryCommand {
    /// Summarize incomplete agents by status and type
    Check {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every incomplete agent
    List,

    /// Delete incomplete lifecycle records
    Clear {
        /// Only this agent
        #[arg(long)]
        agent_id: Option<String>,

        /// Confirm clearing every incomplete record
        #[arg(long)]
        yes: bool,
    },
}

/// Execute the recovery command
pub fn execute(global: &GlobalArgs, args: RecoveryArgs) -> Result<()> {
    let ctx = CliContext::resolve(global)?;
    let store = ctx.store();
    match args.command {
        RecoveryCommand::Check { json } => check(&store, json),
        RecoveryCommand::List => list(&store),
        RecoveryCommand::Clear { agent_id, yes } => clear(&store, agent_id.as_deref(), yes),
    }
}

fn check(store: &StateStore, json: bool) -> Result<()> {
    let summary = store.recovery_summary()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    if summary.is_empty() {
        println!("No incomplete agents");
        return Ok(());
    }
    println!("Incomplete agents: {}", summary.total_incomplete);
    println!();
    println!("By status:");
    for (status, count) in &summary.by_status {
        println!("  {status:<12} {count}");
    }
    println!("By type:");
    for (agent_type, count) in &summary.by_type {
        println!("  {agent_type:<12} {count}");
    }
    Ok(())
}

fn list(store: &StateStore) -> Result<()> {
    let incomplete = store.incomplete()?;
    if incomplete.is_empty() {
        println!("No incomplete agents");
        return Ok(());
    }
    let now = chrono::Utc::now();
    println!(
        "{:<20} {:<10} {:<6} {:<16} {:>8} {:>8}",
        "Agent", "Status", "Type", "Parent", "PID", "Updated"
    );
    println!("{}", "─".repeat(74));
    for record in &incomplete {
        println!(
            "{:<20} {:<10} {:<6} {:<16} {:>8} {:>8}",
            record.agent_id,
            record.status,
            record.agent_type,
            record.parent_agent_id,
            or_dash(record.pid),
            format_age(record.last_updated, now)
        );
    }
    Ok(())
}

fn clear(store: &StateStore, agent_id: Option<&str>, yes: bool) -> Result<()> {
    if let Some(agent_id) = agent_id {
        let Some(record) = store.load(agent_id)? else {
            bail!("Agent '{agent_id}' has no lifecycle record");
        };
        if !record.status.is_incomplete() {
            bail!(
                "Agent '{agent_id}' is {}, not incomplete; use `adc cleanup` for finished agents",
                record.status
            );
        }
        store.delete(agent_id)?;
        println!("Cleared {agent_id} ({})", record.status);
        return Ok(());
    }

    let incomplete = store.incomplete()?;
    if incomplete.is_empty() {
        println!("No incomplete agents");
        return Ok(());
    }
    if !yes {
        bail!(
            "Refusing to clear {} incomplete record(s) without --yes",
            incomplete.len()
        );
    }
    for record in &incomplete {
        store.delete(&record.agent_id)?;
        println!("Cleared {} ({})", record.agent_id, record.status);
    }
    println!("Cleared {} incomplete record(s)", incomplete.len());
    Ok(())
}
