//! Coordinator for agent-deploy
//!
//! Watches a deployment root for request files, spawns and supervises one
//! OS process per request, and keeps the durable lifecycle records in sync
//! with what the processes actually do.

pub mod coordinator;
pub mod supervisor;

pub use coordinator::{SharedSupervisor, run};
pub use supervisor::{Health, HealthReport, Summary, Supervisor, TerminationOutcome};
