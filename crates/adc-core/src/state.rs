//! Lifecycle state store
//!
//! One JSON record per agent under `state/<agent_id>.json`. Records are
//! replaced atomically and every read-modify-write takes a per-agent advisory
//! lock, so status callers and the supervisor can share a store without
//! interleaving writes for the same agent.

use crate::io::{StoreError, acquire_lock, atomic_write};
use crate::layout::DeploymentLayout;
use crate::schema::{AgentState, AgentStatus, is_safe_component};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

const LOCK_RETRIES: u32 = 5;

/// Durable per-agent lifecycle records.
#[derive(Debug, Clone)]
pub struct StateStore {
    layout: DeploymentLayout,
}

/// Startup report of agents whose last persisted status was non-terminal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecoverySummary {
    pub total_incomplete: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub agents: Vec<AgentState>,
}

impl RecoverySummary {
    pub fn is_empty(&self) -> bool {
        self.total_incomplete == 0
    }
}

impl StateStore {
    pub fn new(layout: DeploymentLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    fn record_path(&self, agent_id: &str) -> Result<PathBuf, StoreError> {
        if !is_safe_component(agent_id) {
            return Err(StoreError::NotFound {
                agent_id: agent_id.to_string(),
            });
        }
        Ok(self.layout.state_path(agent_id))
    }

    fn write_record(&self, record: &mut AgentState) -> Result<(), StoreError> {
        let path = self.record_path(&record.agent_id)?;
        record.last_updated = Utc::now();
        let bytes = serde_json::to_vec_pretty(record).map_err(|e| StoreError::json(&path, e))?;
        atomic_write(&path, &bytes)?;
        debug!(agent_id = %record.agent_id, status = %record.status, "state saved");
        Ok(())
    }

    /// Write the full record, stamping `last_updated`. Overwrites are expected.
    pub fn save(&self, record: &mut AgentState) -> Result<(), StoreError> {
        let _lock = acquire_lock(&self.layout.lock_path(&record.agent_id), LOCK_RETRIES)?;
        self.write_record(record)
    }

    /// Read one record. `Ok(None)` when the agent has never been recorded.
    pub fn load(&self, agent_id: &str) -> Result<Option<AgentState>, StoreError> {
        let path = self.record_path(agent_id)?;
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        serde_json::from_slice(&content)
            .map(Some)
            .map_err(|e| StoreError::json(&path, e))
    }

    /// Every readable record keyed by `agent_id`.
    ///
    /// Unreadable or corrupt files are logged and skipped.
    pub fn list_all(&self) -> Result<BTreeMap<String, AgentState>, StoreError> {
        let dir = self.layout.state_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut records = BTreeMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(agent_id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if agent_id.starts_with('.') {
                continue;
            }
            match self.load(agent_id) {
                Ok(Some(record)) => {
                    records.insert(record.agent_id.clone(), record);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable state record")
                }
            }
        }
        Ok(records)
    }

    /// Remove a record. Returns `false` if it did not exist.
    pub fn delete(&self, agent_id: &str) -> Result<bool, StoreError> {
        let path = self.record_path(agent_id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                let lock_path = self.layout.lock_path(agent_id);
                match fs::remove_file(&lock_path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        debug!(path = %lock_path.display(), error = %e, "lock file not removed")
                    }
                }
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Records in PENDING, SPAWNING or RUNNING.
    pub fn incomplete(&self) -> Result<Vec<AgentState>, StoreError> {
        Ok(self
            .list_all()?
            .into_values()
            .filter(|r| r.status.is_incomplete())
            .collect())
    }

    /// Locked read-modify-write of one record's status.
    ///
    /// Refuses to leave a terminal state or move backwards. The matching
    /// terminal timestamp is stamped before `mutate` runs.
    pub fn transition<F>(
        &self,
        agent_id: &str,
        next: AgentStatus,
        mutate: F,
    ) -> Result<AgentState, StoreError>
    where
        F: FnOnce(&mut AgentState),
    {
        let _lock = acquire_lock(&self.layout.lock_path(agent_id), LOCK_RETRIES)?;
        let mut record = self.load(agent_id)?.ok_or_else(|| StoreError::NotFound {
            agent_id: agent_id.to_string(),
        })?;
        if !record.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                agent_id: agent_id.to_string(),
                from: record.status,
                to: next,
            });
        }
        record.apply_status(next, Utc::now());
        mutate(&mut record);
        self.write_record(&mut record)?;
        Ok(record)
    }

    pub fn mark_running(&self, agent_id: &str, pid: u32) -> Result<AgentState, StoreError> {
        self.transition(agent_id, AgentStatus::Running, |r| r.pid = Some(pid))
    }

    pub fn mark_completed(&self, agent_id: &str, exit_code: i32) -> Result<AgentState, StoreError> {
        self.transition(agent_id, AgentStatus::Completed, |r| {
            r.exit_code = Some(exit_code);
            r.progress = 100;
        })
    }

    pub fn mark_failed(
        &self,
        agent_id: &str,
        error: &str,
        exit_code: Option<i32>,
    ) -> Result<AgentState, StoreError> {
        self.transition(agent_id, AgentStatus::Failed, |r| {
            r.error = Some(error.to_string());
            if exit_code.is_some() {
                r.exit_code = exit_code;
            }
        })
    }

    pub fn mark_cancelled(
        &self,
        agent_id: &str,
        exit_code: Option<i32>,
    ) -> Result<AgentState, StoreError> {
        self.transition(agent_id, AgentStatus::Cancelled, |r| r.exit_code = exit_code)
    }

    /// Record progress without touching status. Values above 100 are clamped.
    pub fn update_progress(
        &self,
        agent_id: &str,
        progress: u8,
        message: Option<&str>,
    ) -> Result<AgentState, StoreError> {
        let _lock = acquire_lock(&self.layout.lock_path(agent_id), LOCK_RETRIES)?;
        let mut record = self.load(agent_id)?.ok_or_else(|| StoreError::NotFound {
            agent_id: agent_id.to_string(),
        })?;
        record.progress = progress.min(100);
        if let Some(message) = message {
            record.progress_message = Some(message.to_string());
        }
        self.write_record(&mut record)?;
        Ok(record)
    }

    /// Group the recovery set by status and by agent type.
    pub fn recovery_summary(&self) -> Result<RecoverySummary, StoreError> {
        let agents = self.incomplete()?;
        let mut summary = RecoverySummary {
            total_incomplete: agents.len(),
            ..RecoverySummary::default()
        };
        for agent in &agents {
            *summary.by_status.entry(agent.status.to_string()).or_default() += 1;
            *summary.by_type.entry(agent.agent_type.to_string()).or_default() += 1;
        }
        summary.agents = agents;
        Ok(summary)
    }
}
