//! Process-table introspection
//!
//! CPU, memory, zombie detection and descendant enumeration all come from
//! the OS process table. The supervisor only sees them through
//! [`ProcessInspector`], so tests can script process states that are hard to
//! produce on demand.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::ffi::OsStr;
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InspectError {
    /// Process disappeared between poll and introspection
    #[error("process {0} not found")]
    NotFound(u32),

    #[error("cannot inspect process {pid}: {reason}")]
    Access { pid: u32, reason: String },
}

/// Scheduler state reported by the process table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Running,
    Sleeping,
    Stopped,
    Zombie,
    Other(String),
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Sleeping => f.write_str("sleeping"),
            Self::Stopped => f.write_str("stopped"),
            Self::Zombie => f.write_str("zombie"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// Point-in-time view of one process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    pub state: ProcessState,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub threads: Option<usize>,
    pub cmdline: String,
    pub uptime_secs: u64,
}

impl ProcessSnapshot {
    pub fn is_zombie(&self) -> bool {
        self.state == ProcessState::Zombie
    }

    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// OS process-table queries used by the supervisor.
pub trait ProcessInspector: Send {
    fn inspect(&mut self, pid: u32) -> Result<ProcessSnapshot, InspectError>;

    /// Every descendant of `pid`, parents before children.
    fn descendants(&mut self, pid: u32) -> Vec<u32>;
}

/// [`ProcessInspector`] backed by `sysinfo`.
///
/// Keeps one `System` alive so CPU usage is measured between consecutive
/// refreshes; the first sample of a process reads 0.0.
pub struct SysinfoInspector {
    system: System,
}

impl SysinfoInspector {
    pub fn new() -> Self {
        Self { system: System::new() }
    }
}

impl Default for SysinfoInspector {
    fn default() -> Self {
        Self::new()
    }
}

fn map_status(status: ProcessStatus) -> ProcessState {
    match status {
        ProcessStatus::Run => ProcessState::Running,
        ProcessStatus::Sleep | ProcessStatus::Idle => ProcessState::Sleeping,
        ProcessStatus::Stop => ProcessState::Stopped,
        ProcessStatus::Zombie => ProcessState::Zombie,
        other => ProcessState::Other(other.to_string().to_ascii_lowercase()),
    }
}

impl ProcessInspector for SysinfoInspector {
    fn inspect(&mut self, pid: u32) -> Result<ProcessSnapshot, InspectError> {
        let spid = Pid::from_u32(pid);
        // a targeted refresh leaves exited processes cached; zero refreshed means gone
        let refreshed = self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[spid]),
            ProcessRefreshKind::everything(),
        );
        if refreshed == 0 {
            return Err(InspectError::NotFound(pid));
        }
        let process = self.system.process(spid).ok_or(InspectError::NotFound(pid))?;

        let cmdline = process
            .cmd()
            .iter()
            .map(|arg| AsRef::<OsStr>::as_ref(arg).to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(ProcessSnapshot {
            pid,
            state: map_status(process.status()),
            cpu_percent: process.cpu_usage(),
            memory_bytes: process.memory(),
            threads: process.tasks().map(|tasks| tasks.len().max(1)),
            cmdline,
            uptime_secs: process.run_time(),
        })
    }

    fn descendants(&mut self, pid: u32) -> Vec<u32> {
        self.system.refresh_processes(ProcessesToUpdate::All);

        let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
        for (child, process) in self.system.processes() {
            if let Some(parent) = process.parent() {
                children.entry(parent.as_u32()).or_default().push(child.as_u32());
            }
        }

        let mut found = Vec::new();
        let mut queue = VecDeque::from([pid]);
        while let Some(current) = queue.pop_front() {
            if let Some(kids) = children.get(&current) {
                for &kid in kids {
                    // guard against cycles from pid reuse between refreshes
                    if kid != current && !found.contains(&kid) {
                        found.push(kid);
                        queue.push_back(kid);
                    }
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_self() {
        let mut inspector = SysinfoInspector::new();
        let snapshot = inspector.inspect(std::process::id()).unwrap();
        assert_eq!(snapshot.pid, std::process::id());
        assert!(!snapshot.is_zombie());
        assert!(snapshot.memory_bytes > 0);
    }

    #[test]
    fn test_inspect_missing_pid() {
        let mut inspector = SysinfoInspector::new();
        // PIDs above pid_max cannot exist
        let result = inspector.inspect(u32::MAX - 1);
        assert_eq!(result, Err(InspectError::NotFound(u32::MAX - 1)));
    }

    #[cfg(unix)]
    #[test]
    fn test_inspect_reaped_child_is_not_found() {
        let mut child = std::process::Command::new("/bin/sh")
            .args(["-c", "exec sleep 30"])
            .spawn()
            .unwrap();
        let pid = child.id();

        let mut inspector = SysinfoInspector::new();
        assert!(inspector.inspect(pid).is_ok());

        child.kill().unwrap();
        child.wait().unwrap();
        assert_eq!(inspector.inspect(pid), Err(InspectError::NotFound(pid)));
    }

    #[cfg(unix)]
    #[test]
    fn test_descendants_include_grandchildren() {
        let mut child = std::process::Command::new("/bin/sh")
            .args(["-c", "sleep 5 & sleep 5; wait"])
            .spawn()
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));

        let mut inspector = SysinfoInspector::new();
        let found = inspector.descendants(child.id());
        assert!(found.len() >= 2, "expected two sleeps, found {found:?}");
        assert!(!found.contains(&child.id()));

        for pid in &found {
            unsafe { libc::kill(*pid as libc::pid_t, libc::SIGKILL) };
        }
        let _ = child.kill();
        let _ = child.wait();
    }
}
