//! Schema types for the file-based deployment protocol
//!
//! This module contains every JSON document that crosses a process boundary:
//! request and response files, durable lifecycle records, and the per-agent
//! status snapshot an agent process may update while it runs.

mod agent_state;
mod request;
mod response;
mod status;
mod status_file;

pub use agent_state::AgentState;
pub use request::{DEFAULT_MODEL, DeploymentRequest, RequestError, is_safe_component};
pub use response::DeploymentResponse;
pub use status::{AgentStatus, AgentType};
pub use status_file::AgentStatusFile;
