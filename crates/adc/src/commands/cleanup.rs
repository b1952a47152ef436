//! Cleanup command implementation - apply the retention policy

use agent_deploy_core::retention::apply_retention;
use anyhow::Result;
use clap::Args;

use crate::util::context::{CliContext, GlobalArgs};

/// Remove finished agents older than the retention age
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Show what would be removed without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Override `retention.max_age` (e.g. 30m, 12h, 7d)
    #[arg(long, value_name = "AGE")]
    max_age: Option<String>,

    /// Also remove the agent directories (prompt, logs)
    #[arg(long)]
    remove_agent_dirs: bool,
}

/// Execute the cleanup command
pub fn execute(global: &GlobalArgs, args: CleanupArgs) -> Result<()> {
    let ctx = CliContext::resolve(global)?;

    let mut policy = ctx.config.retention.clone();
    if let Some(max_age) = args.max_age {
        policy.max_age = max_age;
    }
    policy.remove_agent_dirs |= args.remove_agent_dirs;

    if args.dry_run {
        println!("DRY RUN - no files will be modified\n");
    }

    let result = apply_retention(&ctx.store(), &policy, args.dry_run)?;

    let verb = if args.dry_run { "Would remove" } else { "Removed" };
    println!("Retention max age: {}", policy.max_age);
    println!("{verb} {} finished agent record(s), kept {}", result.removed, result.kept);
    for agent_id in &result.removed_agents {
        println!("  {agent_id}");
    }
    println!("{verb} {} request/response pair(s)", result.exchanges_removed);
    Ok(())
}
