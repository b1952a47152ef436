//! Configuration and deployment root resolution shared by every command

use agent_deploy_core::config::{Config, ConfigOverrides, resolve_config};
use agent_deploy_core::home::get_home_dir;
use agent_deploy_core::{DeploymentLayout, StateStore};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Global options accepted by every subcommand.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Deployment root directory (default: ~/.agent-deploy)
    #[arg(long, global = true, value_name = "DIR")]
    pub deployment_dir: Option<PathBuf>,

    /// Configuration file (replaces config discovery)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

pub struct CliContext {
    pub config: Config,
    pub layout: DeploymentLayout,
}

impl CliContext {
    pub fn resolve(global: &GlobalArgs) -> Result<Self> {
        let home_dir = get_home_dir()?;
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        let overrides = ConfigOverrides {
            deployment_dir: global.deployment_dir.clone(),
            config_path: global.config.clone(),
            ..Default::default()
        };
        let config = resolve_config(&overrides, &current_dir, &home_dir)
            .context("Failed to resolve configuration")?;
        let layout = DeploymentLayout::new(config.deployment_root(&home_dir));
        Ok(Self { config, layout })
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.layout.clone())
    }
}
