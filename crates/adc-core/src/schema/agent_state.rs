//! Durable lifecycle record, one file per agent

use super::request::DeploymentRequest;
use super::status::{AgentStatus, AgentType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted lifecycle state of an agent.
///
/// Stored at `state/<agent_id>.json`. This is the only truth about an agent
/// that survives a coordinator restart; the in-memory process handle does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub agent_id: String,

    #[serde(default)]
    pub agent_name: String,

    #[serde(default = "unknown_type")]
    pub agent_type: AgentType,

    #[serde(default)]
    pub parent_agent_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub status: AgentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Set when the record reaches `COMPLETED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Set when the record reaches `FAILED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,

    /// Set when the record reaches `CANCELLED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// 0-100
    #[serde(default)]
    pub progress: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_percentage: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    pub created_at: DateTime<Utc>,

    /// Stamped by the state store on every write
    pub last_updated: DateTime<Utc>,
}

fn unknown_type() -> AgentType {
    AgentType::Other("unknown".to_string())
}

impl AgentState {
    /// Fresh record for a request entering the lifecycle.
    pub fn from_request(request: &DeploymentRequest, status: AgentStatus) -> Self {
        let now = Utc::now();
        Self {
            agent_id: request.agent_id.clone(),
            agent_name: request.agent_name.clone(),
            agent_type: request.agent_type.clone(),
            parent_agent_id: request.parent_agent_id.clone(),
            model: Some(request.model.clone()),
            status,
            pid: None,
            started_at: Some(now),
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            exit_code: None,
            error: None,
            progress: 0,
            progress_message: None,
            load_percentage: Some(request.load_percentage),
            estimated_duration: request.estimated_duration,
            metadata: request.metadata.clone(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Minimal record for an agent whose request details are unknown.
    pub fn bare(agent_id: &str, status: AgentStatus) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.to_string(),
            agent_name: String::new(),
            agent_type: unknown_type(),
            parent_agent_id: String::new(),
            model: None,
            status,
            pid: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
            exit_code: None,
            error: None,
            progress: 0,
            progress_message: None,
            load_percentage: None,
            estimated_duration: None,
            metadata: HashMap::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Timestamp of the terminal transition, if any.
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at.or(self.failed_at).or(self.cancelled_at)
    }

    /// Apply a status change, stamping the matching terminal timestamp.
    ///
    /// Callers are responsible for checking `can_transition_to` first.
    pub(crate) fn apply_status(&mut self, next: AgentStatus, at: DateTime<Utc>) {
        self.status = next;
        match next {
            AgentStatus::Completed => self.completed_at = Some(at),
            AgentStatus::Failed => self.failed_at = Some(at),
            AgentStatus::Cancelled => self.cancelled_at = Some(at),
            AgentStatus::Pending | AgentStatus::Spawning | AgentStatus::Running => {}
        }
    }
}
