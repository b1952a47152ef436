//! Configuration resolution
//!
//! Resolves configuration from multiple sources with priority:
//! 1. Command-line flags (passed as parameters)
//! 2. Environment variables (`ADC_DEPLOYMENT_DIR`, `ADC_AGENT_PROGRAM`)
//! 3. Repo-local config (.adc.toml)
//! 4. Global config (~/.config/adc/config.toml)
//! 5. Defaults

mod discovery;
mod types;

pub use discovery::{ConfigError, ConfigOverrides, resolve_config};
pub use types::{
    AgentConfig, ClientConfig, Config, DeploymentConfig, ExecProfile, ProfileConfig,
    RetentionConfig, SupervisorConfig, WatcherConfig,
};
