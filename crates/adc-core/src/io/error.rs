//! Error types for the state store and file primitives

use crate::schema::AgentStatus;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by durable storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to acquire file lock after multiple retries
    #[error("Failed to acquire lock on {path} after {retries} retries")]
    LockTimeout { path: PathBuf, retries: u32 },

    /// File I/O error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse or serialize JSON
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Write-once target already exists
    #[error("Refusing to overwrite existing file {path}")]
    AlreadyExists { path: PathBuf },

    /// Requested status change leaves an absorbing state or moves backwards
    #[error("Invalid transition for agent {agent_id}: {from} -> {to}")]
    InvalidTransition {
        agent_id: String,
        from: AgentStatus,
        to: AgentStatus,
    },

    /// No durable record exists for the agent
    #[error("No state record for agent {agent_id}")]
    NotFound { agent_id: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
