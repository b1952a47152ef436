//! In-memory handle for one spawned agent process

use super::signal::exit_code_of;
use agent_deploy_core::DeploymentRequest;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::process::Child;
use std::time::{Duration, Instant};
use tracing::warn;

const WAIT_POLL: Duration = Duration::from_millis(50);

/// Live process owned by the supervisor.
///
/// Dropped from the tracked map on terminate or reap. Never persisted; after
/// a coordinator restart only the durable record remains.
#[derive(Debug)]
pub struct ProcessHandle {
    pub agent_id: String,
    pub pid: u32,
    pub agent_dir: PathBuf,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
    pub request: DeploymentRequest,
    pub started_at: DateTime<Utc>,
    child: Child,
    exit_code: Option<i32>,
}

impl ProcessHandle {
    pub fn new(
        request: DeploymentRequest,
        child: Child,
        agent_dir: PathBuf,
        stdout_log: PathBuf,
        stderr_log: PathBuf,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_id: request.agent_id.clone(),
            pid: child.id(),
            agent_dir,
            stdout_log,
            stderr_log,
            request,
            started_at,
            child,
            exit_code: None,
        }
    }

    /// Non-blocking liveness check. Returns the exit code once the process
    /// has exited, reaping it if necessary.
    pub fn poll(&mut self) -> Option<i32> {
        if self.exit_code.is_some() {
            return self.exit_code;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_code = Some(exit_code_of(status));
            }
            Ok(None) => {}
            Err(e) => warn!(agent_id = %self.agent_id, pid = self.pid, "try_wait failed: {}", e),
        }
        self.exit_code
    }

    /// Exit code observed by a previous poll, if any.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn has_exited(&mut self) -> bool {
        self.poll().is_some()
    }

    /// Poll until the process exits or `timeout` elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<i32> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(code) = self.poll() {
                return Some(code);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep(WAIT_POLL.min(deadline - now));
        }
    }

    /// SIGKILL through the std handle. Used on the spawn failure path where
    /// the process may not have fully started.
    pub fn kill(&mut self) {
        if self.poll().is_some() {
            return;
        }
        if let Err(e) = self.child.kill() {
            warn!(agent_id = %self.agent_id, pid = self.pid, "kill failed: {}", e);
        }
    }
}
