//! Coordinator service: request watcher, maintenance loop and shutdown

pub mod event_loop;
pub mod maintenance;
pub mod recovery;
pub mod status;
pub mod watcher;

pub use event_loop::run;
pub use maintenance::maintenance_loop;
pub use recovery::report_recovery;
pub use status::{CoordinatorStatus, StatusWriter};
pub use watcher::{RequestWatcher, watch_requests};

use crate::supervisor::Supervisor;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Supervisor shared between the watcher, the maintenance loop and shutdown.
pub type SharedSupervisor = Arc<Mutex<Supervisor>>;

pub fn new_shared_supervisor(supervisor: Supervisor) -> SharedSupervisor {
    Arc::new(Mutex::new(supervisor))
}

/// Lock the supervisor, recovering from a poisoned mutex.
///
/// A panic inside one agent's operation must not wedge every other agent.
pub fn lock_supervisor(supervisor: &SharedSupervisor) -> MutexGuard<'_, Supervisor> {
    supervisor.lock().unwrap_or_else(PoisonError::into_inner)
}
