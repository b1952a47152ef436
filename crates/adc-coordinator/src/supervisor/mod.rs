//! Process supervisor
//!
//! Owns every agent process spawned by this coordinator. All operations are
//! synchronous and may block (spawn grace, termination escalation); async
//! callers run them on blocking threads behind `Arc<Mutex<Supervisor>>`.
//!
//! Every operation is contained to one agent: failures end up in that
//! agent's response, durable record or `error.log`, never in a panic or an
//! error that aborts the caller's loop.

pub mod credentials;
pub mod handle;
pub mod health;
pub mod inspect;
mod monitor;
pub mod signal;
mod spawn;
mod terminate;

pub use credentials::{Credential, CredentialResolver, CredentialSource};
pub use handle::ProcessHandle;
pub use health::{AgentSummary, Health, HealthReport, ProcessMetrics, Summary};
pub use inspect::{InspectError, ProcessInspector, ProcessSnapshot, ProcessState, SysinfoInspector};
pub use spawn::SpawnError;
pub use terminate::{SignalStage, TerminationOutcome};

use agent_deploy_core::config::Config;
use agent_deploy_core::io::StoreError;
use agent_deploy_core::{DeploymentLayout, StateStore};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, warn};

pub struct Supervisor {
    layout: DeploymentLayout,
    store: StateStore,
    config: Config,
    handles: HashMap<String, ProcessHandle>,
    inspector: Box<dyn ProcessInspector>,
    credentials: CredentialResolver,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("root", &self.layout.root())
            .field("tracked", &self.handles.len())
            .finish()
    }
}

impl Supervisor {
    /// Supervisor over `layout` using the `sysinfo` inspector and a credential
    /// resolver rooted at `home`.
    pub fn new(layout: DeploymentLayout, config: Config, home: Option<&Path>) -> Self {
        let credentials = CredentialResolver::from_config(&config.agent, home);
        Self {
            store: StateStore::new(layout.clone()),
            layout,
            config,
            handles: HashMap::new(),
            inspector: Box::new(SysinfoInspector::new()),
            credentials,
        }
    }

    pub fn with_inspector(mut self, inspector: Box<dyn ProcessInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialResolver) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_tracked(&self, agent_id: &str) -> bool {
        self.handles.contains_key(agent_id)
    }

    /// Tracked agent ids, sorted.
    pub fn list_tracked(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.handles.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Fast liveness check without resource sampling.
    pub fn health_check(&mut self, agent_id: &str) -> bool {
        match self.handles.get_mut(agent_id) {
            Some(handle) => handle.poll().is_none() && signal::is_pid_alive(handle.pid),
            None => false,
        }
    }

    /// Move the durable record to COMPLETED or FAILED according to `exit_code`.
    ///
    /// A record that is already terminal (for example CANCELLED by
    /// terminate) keeps its state.
    fn reconcile_exit(&self, agent_id: &str, exit_code: i32) {
        let result = if exit_code == 0 {
            self.store.mark_completed(agent_id, exit_code)
        } else {
            let message = format!("Process exited with code {exit_code}");
            self.store.mark_failed(agent_id, &message, Some(exit_code))
        };
        match result {
            Ok(record) => debug!(agent_id, exit_code, status = %record.status, "reconciled exit"),
            Err(StoreError::InvalidTransition { from, .. }) => {
                debug!(agent_id, exit_code, status = %from, "record already terminal");
            }
            Err(StoreError::NotFound { .. }) => {
                warn!(agent_id, exit_code, "no durable record to reconcile");
            }
            Err(e) => error!(agent_id, exit_code, "failed to persist exit: {}", e),
        }
    }
}
