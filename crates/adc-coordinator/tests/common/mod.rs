//! Shared fixtures: a deployment root with `/bin/sh` execution profiles.

#![allow(dead_code)]

use agent_deploy_coordinator::supervisor::{CredentialResolver, Supervisor};
use agent_deploy_core::DeploymentLayout;
use agent_deploy_core::config::{Config, ProfileConfig};
use agent_deploy_core::schema::{AgentType, DeploymentRequest};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Credential variable no test environment sets.
pub const TEST_KEY_ENV: &str = "ADC_TEST_CREDENTIAL_NEVER_SET";

/// Models mapped to shell scripts.
pub const PROFILES: &[(&str, &str)] = &[
    ("ok", "sleep 0.5; exit 0"),
    ("fail", "exit 1"),
    ("exit3", "sleep 0.3; exit 3"),
    ("sleep", "sleep 30"),
    ("cooperative", "trap 'exit 7' TERM; while true; do sleep 0.1; done"),
    ("stubborn", "trap '' TERM; while true; do sleep 0.1; done"),
    ("crash2", "sleep 0.2; exit 2"),
    (
        "envdump",
        concat!(
            "cat > stdin.txt; ",
            "printf '%s|%s|%s|%s|%s' ",
            "\"$AGENT_ID\" \"$PARENT_AGENT_ID\" \"$MODEL\" \"$AGENT_TYPE\" ",
            "\"$ADC_TEST_CREDENTIAL_NEVER_SET\" > env.txt; sleep 30",
        ),
    ),
];

pub fn test_config() -> Config {
    let mut config = Config::default();
    for (model, script) in PROFILES {
        config.profiles.insert(
            model.to_string(),
            ProfileConfig {
                program: "/bin/sh".to_string(),
                args: vec!["-c".to_string(), script.to_string()],
                env: HashMap::new(),
            },
        );
    }
    config.profiles.insert(
        "missing".to_string(),
        ProfileConfig {
            program: "/nonexistent/adc-agent".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
        },
    );
    config.supervisor.term_timeout_secs = 2;
    config.supervisor.retry_term_timeout_secs = 1;
    config.supervisor.kill_timeout_secs = 2;
    config.supervisor.child_grace_secs = 1;
    config
}

pub fn supervisor(dir: &TempDir) -> Supervisor {
    supervisor_with(dir, test_config())
}

pub fn supervisor_with(dir: &TempDir, config: Config) -> Supervisor {
    Supervisor::new(DeploymentLayout::new(dir.path()), config, None)
        .with_credentials(CredentialResolver::new(TEST_KEY_ENV, Vec::new(), None))
}

pub fn request(request_id: &str, agent_id: &str, model: &str) -> DeploymentRequest {
    DeploymentRequest {
        request_id: request_id.to_string(),
        parent_agent_id: "OVERWATCH".to_string(),
        agent_id: agent_id.to_string(),
        agent_name: format!("Agent {agent_id}"),
        agent_type: AgentType::L2,
        model: model.to_string(),
        prompt: format!("task for {agent_id}"),
        load_percentage: 10.0,
        estimated_duration: Some(60),
        metadata: HashMap::new(),
    }
}

/// Poll `check` every 50ms until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    check()
}
