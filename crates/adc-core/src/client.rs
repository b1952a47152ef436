//! Deployment client: the caller-facing half of the file protocol
//!
//! A client writes `requests/<request_id>.json` and polls
//! `responses/<request_id>_response.json` until the coordinator answers or
//! the timeout elapses. A timed-out deploy returns a locally built `FAILED`
//! response; the coordinator may still spawn the agent afterwards and the
//! client has no way to cancel or learn about it.

use crate::io::{StoreError, write_once};
use crate::layout::DeploymentLayout;
use crate::schema::{
    AgentStatus, AgentStatusFile, AgentType, DEFAULT_MODEL, DeploymentRequest, DeploymentResponse,
    RequestError,
};
use std::collections::HashMap;
use std::fs;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default response polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Errors raised before a request reaches the coordinator, or while reading
/// its answer. A deploy timeout is not an error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid deployment request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Request {request_id} was already submitted")]
    DuplicateRequest { request_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),
}

/// Parameters of a new agent; the client fills in the request and parent ids.
#[derive(Debug, Clone)]
pub struct NewAgent {
    pub agent_id: String,
    pub agent_name: String,
    pub agent_type: AgentType,
    pub prompt: String,
    pub model: String,
    pub load_percentage: f64,
    pub estimated_duration: Option<u64>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NewAgent {
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        agent_type: AgentType,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            agent_type,
            prompt: prompt.into(),
            model: DEFAULT_MODEL.to_string(),
            load_percentage: 0.0,
            estimated_duration: None,
            metadata: HashMap::new(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn load_percentage(mut self, load: f64) -> Self {
        self.load_percentage = load;
        self
    }

    pub fn estimated_duration(mut self, seconds: u64) -> Self {
        self.estimated_duration = Some(seconds);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Generate a request id of the form `req_<8 hex>`.
pub fn new_request_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("req_{}", &id[..8])
}

/// Client bound to one deployment root and one parent identity.
#[derive(Debug, Clone)]
pub struct DeploymentClient {
    layout: DeploymentLayout,
    parent_agent_id: String,
    poll_interval: Duration,
}

impl DeploymentClient {
    pub fn new(layout: DeploymentLayout, parent_agent_id: impl Into<String>) -> Self {
        Self {
            layout,
            parent_agent_id: parent_agent_id.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Client for a process spawned by the coordinator.
    ///
    /// Uses `ADC_DEPLOYMENT_DIR` for the root and `AGENT_ID` as the parent id,
    /// both injected into every agent's environment.
    pub fn from_env() -> Result<Self, ClientError> {
        let root = std::env::var("ADC_DEPLOYMENT_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ClientError::MissingEnv("ADC_DEPLOYMENT_DIR"))?;
        let parent = std::env::var("AGENT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ClientError::MissingEnv("AGENT_ID"))?;
        Ok(Self::new(DeploymentLayout::new(root), parent))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    pub fn parent_agent_id(&self) -> &str {
        &self.parent_agent_id
    }

    /// Submit `request` and wait up to `timeout` for the coordinator's answer.
    ///
    /// Returns within `timeout` plus one poll interval. On timeout the result
    /// is a synthetic `FAILED` response built locally.
    pub fn deploy(
        &self,
        request: &DeploymentRequest,
        timeout: Duration,
    ) -> Result<DeploymentResponse, ClientError> {
        request.validate()?;

        let request_path = self.layout.request_path(&request.request_id);
        let body = serde_json::to_vec_pretty(request).map_err(|e| StoreError::Json {
            path: request_path.clone(),
            source: e,
        })?;
        match write_once(&request_path, &body) {
            Ok(()) => {}
            Err(StoreError::AlreadyExists { .. }) => {
                return Err(ClientError::DuplicateRequest {
                    request_id: request.request_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }
        info!(
            request_id = %request.request_id,
            agent_id = %request.agent_id,
            "deployment request submitted"
        );

        match self.wait_for_response(&request.request_id, timeout)? {
            Some(response) => {
                info!(
                    request_id = %response.request_id,
                    agent_id = %response.agent_id,
                    status = %response.status,
                    "deployment response received"
                );
                Ok(response)
            }
            None => {
                warn!(
                    request_id = %request.request_id,
                    timeout_secs = timeout.as_secs(),
                    "deployment timed out"
                );
                Ok(timeout_response(request, timeout))
            }
        }
    }

    /// Build a request for `agent` under this client's parent id and deploy it.
    pub fn deploy_agent(
        &self,
        agent: NewAgent,
        timeout: Duration,
    ) -> Result<DeploymentResponse, ClientError> {
        let request = DeploymentRequest {
            request_id: new_request_id(),
            parent_agent_id: self.parent_agent_id.clone(),
            agent_id: agent.agent_id,
            agent_name: agent.agent_name,
            agent_type: agent.agent_type,
            model: agent.model,
            prompt: agent.prompt,
            load_percentage: agent.load_percentage,
            estimated_duration: agent.estimated_duration,
            metadata: agent.metadata,
        };
        self.deploy(&request, timeout)
    }

    fn wait_for_response(
        &self,
        request_id: &str,
        timeout: Duration,
    ) -> Result<Option<DeploymentResponse>, ClientError> {
        let path = self.layout.response_path(request_id);
        let deadline = Instant::now() + timeout;
        loop {
            match fs::read(&path) {
                Ok(bytes) => {
                    let response = serde_json::from_slice(&bytes).map_err(|e| StoreError::Json {
                        path: path.clone(),
                        source: e,
                    })?;
                    return Ok(Some(response));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io { path, source: e }.into()),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Status snapshot of one agent, read straight from its directory.
    pub fn get_status(&self, agent_id: &str) -> Result<Option<AgentStatusFile>, ClientError> {
        let path = self.layout.status_file_path(agent_id);
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Json { path, source: e }.into()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io { path, source: e }.into()),
        }
    }

    /// Snapshots of agents deployed by this client's parent id.
    pub fn list_mine(&self) -> Result<Vec<AgentStatusFile>, ClientError> {
        let parent = self.parent_agent_id.as_str();
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|s| s.parent_agent_id.as_deref() == Some(parent))
            .collect())
    }

    /// Every readable snapshot under `agents/`, sorted by agent id.
    pub fn list_all(&self) -> Result<Vec<AgentStatusFile>, ClientError> {
        let dir = self.layout.agents_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::Io { path: dir, source: e }.into()),
        };

        let mut snapshots = Vec::new();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let agent_id = entry.file_name().to_string_lossy().into_owned();
            match self.get_status(&agent_id) {
                Ok(Some(snapshot)) => snapshots.push(snapshot),
                Ok(None) => {}
                Err(e) => {
                    debug!(agent_id = %agent_id, error = %e, "skipping unreadable status file")
                }
            }
        }
        snapshots.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(snapshots)
    }
}

fn timeout_response(request: &DeploymentRequest, timeout: Duration) -> DeploymentResponse {
    DeploymentResponse {
        request_id: request.request_id.clone(),
        agent_id: request.agent_id.clone(),
        status: AgentStatus::Failed,
        pid: None,
        started_at: None,
        message: "Deployment timeout".to_string(),
        error: Some(format!(
            "deployment timeout: no response received within {} seconds",
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_format() {
        let id = new_request_id();
        assert!(id.starts_with("req_"));
        assert_eq!(id.len(), 12);
        assert!(id[4..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_request_id());
    }

    #[test]
    fn test_new_agent_builder_defaults() {
        let agent = NewAgent::new("A1", "Worker", AgentType::L3, "do it")
            .load_percentage(10.0)
            .metadata("ticket", serde_json::json!(42));
        assert_eq!(agent.model, "haiku");
        assert_eq!(agent.load_percentage, 10.0);
        assert!(agent.estimated_duration.is_none());
        assert_eq!(agent.metadata["ticket"], 42);
    }
}
