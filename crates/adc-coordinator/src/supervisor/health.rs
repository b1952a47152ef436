//! Composite health views produced by the supervisor

use super::inspect::{ProcessSnapshot, ProcessState};
use agent_deploy_core::{AgentState, AgentStatusFile};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Point-in-time classification of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Zombie,
    Completed,
    Failed,
    Unknown,
}

impl Health {
    /// zombie > healthy > completed > failed > unknown
    pub fn derive(alive: bool, zombie: bool, exit_code: Option<i32>) -> Self {
        if zombie {
            Health::Zombie
        } else if alive {
            Health::Healthy
        } else {
            match exit_code {
                Some(0) => Health::Completed,
                Some(_) => Health::Failed,
                None => Health::Unknown,
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Health::Healthy => "healthy",
            Health::Zombie => "zombie",
            Health::Completed => "completed",
            Health::Failed => "failed",
            Health::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Resource usage of a live, non-zombie process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessMetrics {
    pub cpu_percent: f32,
    pub memory_mb: f64,
    pub threads: Option<usize>,
    pub cmdline: String,
    pub uptime_secs: u64,
}

impl From<&ProcessSnapshot> for ProcessMetrics {
    fn from(snapshot: &ProcessSnapshot) -> Self {
        Self {
            cpu_percent: snapshot.cpu_percent,
            memory_mb: snapshot.memory_mb(),
            threads: snapshot.threads,
            cmdline: snapshot.cmdline.clone(),
            uptime_secs: snapshot.uptime_secs,
        }
    }
}

/// Result of `Supervisor::status`.
///
/// Field-level errors (`process_error`, `status_file_error`) never discard
/// the rest of the report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub agent_id: String,
    pub pid: u32,
    pub health: Health,
    pub alive: bool,
    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_state: Option<ProcessState>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ProcessMetrics>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_error: Option<String>,

    /// Progress as reported by the agent, falling back to the durable record
    pub progress: u8,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_file: Option<AgentStatusFile>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_file_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<AgentState>,
}

/// Aggregate over every tracked agent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub total: usize,
    pub running: usize,
    pub zombie: usize,
    pub completed: usize,
    pub failed: usize,
    pub unknown: usize,
    pub total_cpu_percent: f32,
    pub total_memory_mb: f64,
    pub agents: Vec<AgentSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub agent_id: String,
    pub pid: u32,
    pub health: Health,
    pub progress: u8,
}

impl Summary {
    pub(crate) fn add(&mut self, report: &HealthReport) {
        self.total += 1;
        match report.health {
            Health::Healthy => self.running += 1,
            Health::Zombie => self.zombie += 1,
            Health::Completed => self.completed += 1,
            Health::Failed => self.failed += 1,
            Health::Unknown => self.unknown += 1,
        }
        if let Some(metrics) = &report.metrics {
            self.total_cpu_percent += metrics.cpu_percent;
            self.total_memory_mb += metrics.memory_mb;
        }
        self.agents.push(AgentSummary {
            agent_id: report.agent_id.clone(),
            pid: report.pid,
            health: report.health,
            progress: report.progress,
        });
    }
}
