//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where the deployment root lives
    #[serde(default)]
    pub deployment: DeploymentConfig,
    /// Default agent executable and credential handling
    #[serde(default)]
    pub agent: AgentConfig,
    /// Execution profiles selected by a request's `model`: [profiles.<model>]
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
    /// Spawn and termination timings
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Request watcher settings
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Retention of terminal state records
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Deployment client defaults
    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Deployment root (default: ~/.agent-deploy). A leading `~/` is expanded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// Default agent executable.
///
/// `args` may contain the placeholders `{agent_id}`, `{model}`,
/// `{prompt_file}` and `{agent_dir}`. The prompt is also fed on stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Environment variable that receives the resolved credential
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
    /// Directories searched for credential key files
    #[serde(default)]
    pub key_dirs: Vec<PathBuf>,
    /// Extra environment passed to every agent
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            credential_env: default_credential_env(),
            key_dirs: Vec::new(),
            env: HashMap::new(),
        }
    }
}

fn default_program() -> String {
    "claude".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-p".to_string(), "--model".to_string(), "{model}".to_string()]
}

fn default_credential_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

/// One `[profiles.<model>]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Executable chosen for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecProfile {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Liveness grace after spawn before the process counts as started
    #[serde(default = "default_spawn_grace_ms")]
    pub spawn_grace_ms: u64,
    /// Wait after the first SIGTERM
    #[serde(default = "default_term_timeout_secs")]
    pub term_timeout_secs: u64,
    /// Wait after the second SIGTERM
    #[serde(default = "default_retry_timeout_secs")]
    pub retry_term_timeout_secs: u64,
    /// Wait after SIGKILL
    #[serde(default = "default_retry_timeout_secs")]
    pub kill_timeout_secs: u64,
    /// Per-child wait between SIGTERM and SIGKILL
    #[serde(default = "default_child_grace_secs")]
    pub child_grace_secs: u64,
    /// Blocking wait used to reap a zombie
    #[serde(default = "default_reap_timeout_ms")]
    pub reap_timeout_ms: u64,
    /// Interval of the coordinator's maintenance loop
    #[serde(default = "default_maintenance_interval_secs")]
    pub maintenance_interval_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            spawn_grace_ms: default_spawn_grace_ms(),
            term_timeout_secs: default_term_timeout_secs(),
            retry_term_timeout_secs: default_retry_timeout_secs(),
            kill_timeout_secs: default_retry_timeout_secs(),
            child_grace_secs: default_child_grace_secs(),
            reap_timeout_ms: default_reap_timeout_ms(),
            maintenance_interval_secs: default_maintenance_interval_secs(),
        }
    }
}

impl SupervisorConfig {
    pub fn spawn_grace(&self) -> Duration {
        Duration::from_millis(self.spawn_grace_ms)
    }

    pub fn reap_timeout(&self) -> Duration {
        Duration::from_millis(self.reap_timeout_ms)
    }
}

fn default_spawn_grace_ms() -> u64 {
    100
}

fn default_term_timeout_secs() -> u64 {
    10
}

fn default_retry_timeout_secs() -> u64 {
    5
}

fn default_child_grace_secs() -> u64 {
    3
}

fn default_reap_timeout_ms() -> u64 {
    1000
}

fn default_maintenance_interval_secs() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Periodic rescan interval backing up filesystem notifications
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Retention configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Maximum age of a terminal record (duration string: "7d", "24h")
    #[serde(default = "default_max_age")]
    pub max_age: String,
    /// Also remove `agents/<agent_id>/` for swept records
    #[serde(default)]
    pub remove_agent_dirs: bool,
    /// Enable periodic retention in the coordinator (default: false)
    #[serde(default)]
    pub enabled: bool,
    /// Interval in seconds between coordinator retention runs
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: default_max_age(),
            remove_agent_dirs: false,
            enabled: false,
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_max_age() -> String {
    "7d".to_string()
}

fn default_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Default `deploy` timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Response polling interval
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Deployment root, falling back to `<home>/.agent-deploy`.
    pub fn deployment_root(&self, home_dir: &Path) -> PathBuf {
        match &self.deployment.root {
            Some(root) => crate::home::expand_tilde(root, home_dir),
            None => home_dir.join(crate::home::DEFAULT_ROOT_DIR),
        }
    }

    /// Executable for `model`: its profile if configured, else `[agent]`.
    pub fn profile_for(&self, model: &str) -> ExecProfile {
        match self.profiles.get(model) {
            Some(profile) => ExecProfile {
                program: profile.program.clone(),
                args: profile.args.clone(),
                env: profile.env.clone(),
            },
            None => ExecProfile {
                program: self.agent.program.clone(),
                args: self.agent.args.clone(),
                env: HashMap::new(),
            },
        }
    }
}
