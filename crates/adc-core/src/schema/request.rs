//! Deployment request submitted by a parent agent

use super::status::AgentType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Execution profile used when a request does not name one.
pub const DEFAULT_MODEL: &str = "haiku";

/// Validation failures for a parsed request.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// `agent_id` doubles as a directory and file name
    #[error("agent_id {0:?} is not a valid path component")]
    InvalidAgentId(String),

    #[error("load_percentage {0} is outside 0-100")]
    InvalidLoad(f64),
}

/// Agent deployment request.
///
/// Written once to `requests/<request_id>.json` and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Unique per submission; keys the response file
    pub request_id: String,

    /// Agent making the request
    pub parent_agent_id: String,

    /// Unique name for the new agent (e.g., "L2.10.1")
    pub agent_id: String,

    /// Human-readable agent name
    pub agent_name: String,

    /// Hierarchy tier
    pub agent_type: AgentType,

    /// Execution profile selector, opaque to the protocol
    #[serde(default = "default_model")]
    pub model: String,

    /// Task payload, materialized as `prompt.txt`
    pub prompt: String,

    /// Share of the parent's workload, informational only
    pub load_percentage: f64,

    /// Estimated run time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl DeploymentRequest {
    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.request_id.trim().is_empty() {
            return Err(RequestError::MissingField("request_id"));
        }
        if self.agent_id.trim().is_empty() {
            return Err(RequestError::MissingField("agent_id"));
        }
        if !is_safe_component(&self.agent_id) {
            return Err(RequestError::InvalidAgentId(self.agent_id.clone()));
        }
        if !is_safe_component(&self.request_id) {
            return Err(RequestError::InvalidAgentId(self.request_id.clone()));
        }
        if !(0.0..=100.0).contains(&self.load_percentage) {
            return Err(RequestError::InvalidLoad(self.load_percentage));
        }
        Ok(())
    }
}

/// A string usable as a single visible file name: no separators and no
/// leading `.`, which the watcher and the store treat as staging files.
pub fn is_safe_component(s: &str) -> bool {
    !s.is_empty() && !s.starts_with('.') && !s.contains(['/', '\\', '\0'])
}
