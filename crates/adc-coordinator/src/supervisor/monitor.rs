//! Read-side operations: status, summary and zombie reaping

use super::Supervisor;
use super::health::{Health, HealthReport, ProcessMetrics, Summary};
use super::inspect::InspectError;
use agent_deploy_core::AgentStatusFile;
use std::fs;
use tracing::{debug, info, warn};

impl Supervisor {
    /// Composite health of a tracked agent, `None` if not tracked.
    ///
    /// Side effects: an observed exit moves the durable record to COMPLETED
    /// or FAILED, and a higher progress reported by the agent's status file
    /// is copied into the durable record.
    pub fn status(&mut self, agent_id: &str) -> Option<HealthReport> {
        let reap_timeout = self.config.supervisor.reap_timeout();
        let handle = self.handles.get_mut(agent_id)?;
        let pid = handle.pid;
        let started_at = handle.started_at;

        let mut exit_code = handle.poll();
        let mut process_state = None;
        let mut metrics = None;
        let mut process_error = None;
        let mut zombie = false;

        if exit_code.is_none() {
            match self.inspector.inspect(pid) {
                Ok(snapshot) => {
                    zombie = snapshot.is_zombie();
                    if !zombie {
                        metrics = Some(ProcessMetrics::from(&snapshot));
                    }
                    process_state = Some(snapshot.state);
                }
                Err(InspectError::NotFound(_)) => {
                    // exited between poll and introspection
                    exit_code = handle.wait_timeout(reap_timeout);
                    if exit_code.is_none() {
                        process_error = Some(InspectError::NotFound(pid).to_string());
                    }
                }
                Err(e) => process_error = Some(e.to_string()),
            }
        }

        if let Some(code) = exit_code {
            self.reconcile_exit(agent_id, code);
        }

        let (status_file, status_file_error) = self.read_status_file(agent_id);
        if let Some(file) = &status_file {
            self.sync_progress(agent_id, file.progress);
        }
        let state = match self.store.load(agent_id) {
            Ok(state) => state,
            Err(e) => {
                warn!(agent_id, "failed to load durable record: {}", e);
                None
            }
        };

        let progress = status_file
            .as_ref()
            .map(|f| f.progress)
            .into_iter()
            .chain(state.as_ref().map(|s| s.progress))
            .max()
            .unwrap_or(0)
            .min(100);

        let alive = exit_code.is_none() && process_error.is_none() && !zombie;
        Some(HealthReport {
            agent_id: agent_id.to_string(),
            pid,
            health: Health::derive(alive, zombie, exit_code),
            alive,
            started_at,
            process_state,
            metrics,
            exit_code,
            process_error,
            progress,
            status_file,
            status_file_error,
            state,
        })
    }

    /// Aggregate health over every tracked agent.
    pub fn summary(&mut self) -> Summary {
        let mut summary = Summary::default();
        for agent_id in self.list_tracked() {
            if let Some(report) = self.status(&agent_id) {
                summary.add(&report);
            }
        }
        summary
    }

    /// Reap every tracked zombie, reconcile its exit code and stop tracking
    /// it. Returns the reaped agent ids.
    pub fn reap_zombies(&mut self) -> Vec<String> {
        let reap_timeout = self.config.supervisor.reap_timeout();
        let mut reaped = Vec::new();

        for agent_id in self.list_tracked() {
            let Some(handle) = self.handles.get_mut(&agent_id) else {
                continue;
            };
            if handle.exit_code().is_some() {
                continue;
            }
            // inspect before polling: try_wait would reap the zombie itself
            let is_zombie = match self.inspector.inspect(handle.pid) {
                Ok(snapshot) => snapshot.is_zombie(),
                Err(_) => false,
            };
            if !is_zombie {
                continue;
            }
            let pid = handle.pid;
            match handle.wait_timeout(reap_timeout) {
                Some(code) => {
                    info!(agent_id = %agent_id, pid, exit_code = code, "reaped zombie agent");
                    self.handles.remove(&agent_id);
                    self.reconcile_exit(&agent_id, code);
                    reaped.push(agent_id);
                }
                None => warn!(agent_id = %agent_id, pid, "zombie not reaped within timeout"),
            }
        }
        reaped
    }

    /// Stop tracking agents whose exit has already been observed and
    /// reconciled. Returns their ids.
    pub fn forget_exited(&mut self) -> Vec<String> {
        let exited: Vec<String> = self
            .handles
            .iter()
            .filter(|(_, h)| h.exit_code().is_some())
            .map(|(id, _)| id.clone())
            .collect();
        for agent_id in &exited {
            if let Some(handle) = self.handles.remove(agent_id) {
                if let Some(code) = handle.exit_code() {
                    self.reconcile_exit(agent_id, code);
                }
                debug!(agent_id = %agent_id, "dropped exited agent from tracking");
            }
        }
        exited
    }

    fn read_status_file(&self, agent_id: &str) -> (Option<AgentStatusFile>, Option<String>) {
        let path = self.layout.status_file_path(agent_id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return (None, None),
            Err(e) => return (None, Some(format!("{}: {}", path.display(), e))),
        };
        match serde_json::from_str(&content) {
            Ok(file) => (Some(file), None),
            Err(e) => (None, Some(format!("{}: {}", path.display(), e))),
        }
    }

    fn sync_progress(&self, agent_id: &str, reported: u8) {
        let current = match self.store.load(agent_id) {
            Ok(Some(record)) => record.progress,
            _ => return,
        };
        if reported > current {
            if let Err(e) = self.store.update_progress(agent_id, reported, None) {
                warn!(agent_id, "failed to sync progress: {}", e);
            }
        }
    }
}
