//! Core types and storage for agent-deploy (adc)
//!
//! This crate implements the caller-facing half of the file-based deployment
//! protocol and the durable lifecycle records shared with the coordinator.
//! Everything crosses process boundaries through a deployment root:
//!
//! ```text
//! <root>/requests/<request_id>.json
//! <root>/responses/<request_id>_response.json
//! <root>/agents/<agent_id>/{prompt.txt,status.json,stdout.log,stderr.log,error.log}
//! <root>/state/<agent_id>.json
//! ```
//!
//! All schema types are designed to:
//! - Serialize with stable snake_case field names shared by every participant
//! - Preserve unknown fields written by agent processes into their status files
//! - Be written atomically so readers never observe partial JSON

pub mod client;
pub mod config;
pub mod home;
pub mod io;
pub mod layout;
pub mod logging;
pub mod retention;
pub mod schema;
pub mod state;

pub use client::{ClientError, DeploymentClient, NewAgent};
pub use layout::DeploymentLayout;
pub use schema::{
    AgentState, AgentStatus, AgentStatusFile, AgentType, DeploymentRequest, DeploymentResponse,
};
pub use state::{RecoverySummary, StateStore};
