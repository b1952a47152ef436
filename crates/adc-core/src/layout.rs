//! Paths under a deployment root
//!
//! ```text
//! <root>/requests/<request_id>.json
//! <root>/responses/<request_id>_response.json
//! <root>/agents/<agent_id>/{prompt.txt,status.json,stdout.log,stderr.log,error.log}
//! <root>/state/<agent_id>.json
//! <root>/status/coordinator.json
//! ```

use crate::io::StoreError;
use std::path::{Path, PathBuf};

/// Resolved directory layout of one deployment root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentLayout {
    root: PathBuf,
}

impl DeploymentLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn requests_dir(&self) -> PathBuf {
        self.root.join("requests")
    }

    pub fn responses_dir(&self) -> PathBuf {
        self.root.join("responses")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join("state")
    }

    pub fn status_dir(&self) -> PathBuf {
        self.root.join("status")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.state_dir().join(".locks")
    }

    pub fn request_path(&self, request_id: &str) -> PathBuf {
        self.requests_dir().join(format!("{request_id}.json"))
    }

    pub fn response_path(&self, request_id: &str) -> PathBuf {
        self.responses_dir()
            .join(format!("{request_id}_response.json"))
    }

    pub fn agent_dir(&self, agent_id: &str) -> PathBuf {
        self.agents_dir().join(agent_id)
    }

    pub fn prompt_path(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("prompt.txt")
    }

    pub fn status_file_path(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("status.json")
    }

    pub fn stdout_log_path(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("stdout.log")
    }

    pub fn stderr_log_path(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("stderr.log")
    }

    pub fn error_log_path(&self, agent_id: &str) -> PathBuf {
        self.agent_dir(agent_id).join("error.log")
    }

    pub fn state_path(&self, agent_id: &str) -> PathBuf {
        self.state_dir().join(format!("{agent_id}.json"))
    }

    pub fn lock_path(&self, agent_id: &str) -> PathBuf {
        self.locks_dir().join(format!("{agent_id}.lock"))
    }

    pub fn coordinator_status_path(&self) -> PathBuf {
        self.status_dir().join("coordinator.json")
    }

    /// Create every top-level directory. Idempotent.
    pub fn ensure(&self) -> Result<(), StoreError> {
        for dir in [
            self.requests_dir(),
            self.responses_dir(),
            self.agents_dir(),
            self.state_dir(),
            self.status_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(())
    }
}
