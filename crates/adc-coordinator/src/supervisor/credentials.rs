//! Credential lookup for spawned agents
//!
//! Resolution order: the process environment, then well-known key files in
//! each configured key directory, then the SDK default credential file.
//! A missing credential never fails a spawn; the agent decides whether it
//! can run without one.

use agent_deploy_core::config::AgentConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key file names tried in every key directory, in order.
pub const KEY_FILES: [&str; 3] = ["anthropic-api.txt", "claude-api.txt", "anthropic.txt"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Environment,
    KeyFile(PathBuf),
    SdkDefault(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub source: CredentialSource,
}

#[derive(Debug, Clone)]
pub struct CredentialResolver {
    env_var: String,
    key_dirs: Vec<PathBuf>,
    sdk_default: Option<PathBuf>,
}

impl CredentialResolver {
    pub fn new(
        env_var: impl Into<String>,
        key_dirs: Vec<PathBuf>,
        sdk_default: Option<PathBuf>,
    ) -> Self {
        Self {
            env_var: env_var.into(),
            key_dirs,
            sdk_default,
        }
    }

    /// Resolver for `[agent]` settings; `<home>/.config/adc/keys` is always
    /// searched after the configured directories.
    pub fn from_config(agent: &AgentConfig, home: Option<&Path>) -> Self {
        let mut key_dirs: Vec<PathBuf> = agent
            .key_dirs
            .iter()
            .map(|dir| match home {
                Some(home) => agent_deploy_core::home::expand_tilde(dir, home),
                None => dir.clone(),
            })
            .collect();
        if let Some(home) = home {
            key_dirs.push(home.join(".config").join("adc").join("keys"));
        }
        let sdk_default = home.map(|h| h.join(".anthropic").join("api_key"));
        Self::new(agent.credential_env.clone(), key_dirs, sdk_default)
    }

    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    /// Resolve against the current process environment.
    pub fn resolve(&self) -> Option<Credential> {
        self.resolve_with(std::env::var(&self.env_var).ok())
    }

    /// Resolve with an explicit value standing in for the environment.
    pub fn resolve_with(&self, env_value: Option<String>) -> Option<Credential> {
        if let Some(value) = env_value.filter(|v| !v.trim().is_empty()) {
            return Some(Credential {
                value,
                source: CredentialSource::Environment,
            });
        }

        for dir in &self.key_dirs {
            for name in KEY_FILES {
                let path = dir.join(name);
                if let Some(value) = read_key(&path) {
                    debug!(path = %path.display(), "loaded credential from key file");
                    return Some(Credential {
                        value,
                        source: CredentialSource::KeyFile(path),
                    });
                }
            }
        }

        if let Some(path) = &self.sdk_default {
            if let Some(value) = read_key(path) {
                debug!(path = %path.display(), "loaded credential from SDK default location");
                return Some(Credential {
                    value,
                    source: CredentialSource::SdkDefault(path.clone()),
                });
            }
        }

        None
    }
}

fn read_key(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match fs::read_to_string(path) {
        Ok(content) => {
            let trimmed = content.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(e) => {
            warn!("Failed to read key file {}: {}", path.display(), e);
            None
        }
    }
}
