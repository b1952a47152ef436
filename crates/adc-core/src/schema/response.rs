//! Deployment response written by the coordinator

use super::status::AgentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agent deployment response.
///
/// Produced exactly once per request and written to
/// `responses/<request_id>_response.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResponse {
    pub request_id: String,

    pub agent_id: String,

    pub status: AgentStatus,

    /// Present only if a process was actually started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentResponse {
    /// Successful spawn.
    pub fn running(request_id: &str, agent_id: &str, pid: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            request_id: request_id.to_string(),
            agent_id: agent_id.to_string(),
            status: AgentStatus::Running,
            pid: Some(pid),
            started_at: Some(started_at),
            message: format!("Agent {agent_id} deployed successfully (PID: {pid})"),
            error: None,
        }
    }

    /// Failed deployment; never carries a PID.
    pub fn failed(
        request_id: &str,
        agent_id: &str,
        message: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            agent_id: agent_id.to_string(),
            status: AgentStatus::Failed,
            pid: None,
            started_at: None,
            message: message.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_response_json_shape() {
        let resp = DeploymentResponse::running("req_001", "L2.10.1", 12345, Utc::now());
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["status"], "running");
        assert_eq!(value["pid"], 12345);
        assert!(value.get("error").is_none());
        assert!(resp.is_success());
    }

    #[test]
    fn test_failed_response_has_no_pid() {
        let resp = DeploymentResponse::failed("req_9", "A", "Deployment failed", "boom");
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["status"], "failed");
        assert!(value.get("pid").is_none());
        assert_eq!(value["error"], "boom");
        assert!(!resp.is_success());
    }

    #[test]
    fn test_response_parses_minimal() {
        let json = r#"{"request_id":"r","agent_id":"a","status":"failed"}"#;
        let resp: DeploymentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, AgentStatus::Failed);
        assert!(resp.message.is_empty());
    }
}
