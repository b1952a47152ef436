//! Per-agent status snapshot at `agents/<agent_id>/status.json`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status snapshot written by the supervisor at spawn time.
///
/// The agent process owns this file afterwards and may rewrite it with
/// finer-grained progress. `status` is free text because agents report their
/// own vocabulary (e.g. `"working"`); unknown fields are preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusFile {
    pub agent_id: String,

    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub progress: u8,

    /// Unknown fields for forward compatibility
    #[serde(flatten)]
    pub unknown_fields: HashMap<String, serde_json::Value>,
}

impl AgentStatusFile {
    pub fn running(
        agent_id: &str,
        parent_agent_id: &str,
        pid: u32,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: "running".to_string(),
            parent_agent_id: Some(parent_agent_id.to_string()),
            pid: Some(pid),
            started_at: Some(started_at),
            progress: 0,
            unknown_fields: HashMap::new(),
        }
    }
}
