//! Coordinator status file writer
//!
//! Writes `status/coordinator.json` under the deployment root so the CLI can
//! show what the running coordinator is supervising.

use crate::supervisor::Summary;
use agent_deploy_core::io::atomic_write;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Snapshot written to `status/coordinator.json`
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub timestamp: DateTime<Utc>,
    pub pid: u32,
    pub version: String,
    pub uptime_secs: u64,
    pub deployment_root: PathBuf,
    /// False in the final snapshot written during shutdown
    pub running: bool,
    pub summary: Summary,
}

pub struct StatusWriter {
    status_path: PathBuf,
    deployment_root: PathBuf,
    start_time: Instant,
    version: String,
}

impl StatusWriter {
    pub fn new(status_path: PathBuf, deployment_root: &Path, version: impl Into<String>) -> Self {
        Self {
            status_path,
            deployment_root: deployment_root.to_path_buf(),
            start_time: Instant::now(),
            version: version.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.status_path
    }

    /// Write the snapshot atomically.
    pub fn write(&self, summary: Summary, running: bool) -> Result<CoordinatorStatus> {
        let status = CoordinatorStatus {
            timestamp: Utc::now(),
            pid: std::process::id(),
            version: self.version.clone(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            deployment_root: self.deployment_root.clone(),
            running,
            summary,
        };
        let json = serde_json::to_vec_pretty(&status)
            .context("Failed to serialize coordinator status")?;
        atomic_write(&self.status_path, &json)
            .with_context(|| format!("Failed to write {}", self.status_path.display()))?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_status_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("status").join("coordinator.json");
        let writer = StatusWriter::new(path.clone(), dir.path(), "0.3.0");

        let status = writer.write(Summary::default(), true).unwrap();
        assert_eq!(status.pid, std::process::id());

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["version"], "0.3.0");
        assert_eq!(value["running"], true);
        assert_eq!(value["summary"]["total"], 0);
    }
}
