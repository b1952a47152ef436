//! CLI command dispatch and execution

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::util::context::GlobalArgs;

mod cleanup;
mod deploy;
mod list;
mod recovery;
mod status;

/// adc - deploy and inspect supervised agents
#[derive(Parser, Debug)]
#[command(
    name = "adc",
    version,
    about = "Deploy and inspect supervised agents",
    long_about = "A thin CLI over the file-based deployment protocol served by adc-coordinator"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a deployment request and wait for the coordinator's response
    Deploy(deploy::DeployArgs),

    /// Show one agent's status snapshot and lifecycle record
    Status(status::StatusArgs),

    /// List agent status snapshots
    List(list::ListArgs),

    /// Inspect or clear agents left incomplete by a coordinator restart
    Recovery(recovery::RecoveryArgs),

    /// Apply the retention policy to finished agents
    Cleanup(cleanup::CleanupArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Deploy(args) => deploy::execute(&self.global, args),
            Commands::Status(args) => status::execute(&self.global, args),
            Commands::List(args) => list::execute(&self.global, args),
            Commands::Recovery(args) => recovery::execute(&self.global, args),
            Commands::Cleanup(args) => cleanup::execute(&self.global, args),
        }
    }
}
