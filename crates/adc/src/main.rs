//! adc - submit agent deployments and inspect their lifecycle
//!
//! A thin CLI over the deployment root's file-based protocol: it writes
//! request files, waits for the coordinator's response, and reads the
//! per-agent status snapshots and durable lifecycle records.

use clap::Parser;

mod commands;
mod util;

use commands::Cli;

fn main() {
    let cli = Cli::parse();
    agent_deploy_core::logging::init();

    if let Err(e) = cli.execute() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
