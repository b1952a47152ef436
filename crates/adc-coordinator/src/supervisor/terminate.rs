//! Termination: zombie short-circuit, signal escalation, descendant cleanup

use super::Supervisor;
use super::handle::ProcessHandle;
use super::inspect::InspectError;
use super::signal::{Signal, is_pid_alive, send_signal};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const CHILD_POLL: Duration = Duration::from_millis(50);

/// Signal step that ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStage {
    Term,
    TermRetry,
    Kill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminationOutcome {
    /// Nothing tracked under that id
    NotTracked,
    /// Exited before any signal was sent
    AlreadyExited { exit_code: i32 },
    ZombieReaped { exit_code: i32 },
    Terminated { exit_code: i32, stage: SignalStage },
    /// Still alive after SIGKILL; left for the operator
    Survived,
}

impl Supervisor {
    /// Stop a tracked agent and its descendants.
    ///
    /// The handle is always dropped from tracking. Signalled agents end up
    /// CANCELLED; agents found already exited are reconciled from their exit
    /// code instead.
    pub fn terminate(&mut self, agent_id: &str, force: bool) -> TerminationOutcome {
        let Some(mut handle) = self.handles.remove(agent_id) else {
            debug!(agent_id, "terminate: not tracked");
            return TerminationOutcome::NotTracked;
        };
        let pid = handle.pid;
        let reap_timeout = self.config.supervisor.reap_timeout();

        if handle.exit_code().is_none() {
            if let Ok(snapshot) = self.inspector.inspect(pid) {
                if snapshot.is_zombie() {
                    if let Some(code) = handle.wait_timeout(reap_timeout) {
                        info!(
                            agent_id,
                            pid,
                            exit_code = code,
                            "reaped zombie instead of signalling"
                        );
                        self.reconcile_exit(agent_id, code);
                        return TerminationOutcome::ZombieReaped { exit_code: code };
                    }
                    warn!(agent_id, pid, "zombie not reaped within timeout; escalating");
                }
            }
        }

        if let Some(code) = handle.poll() {
            self.reconcile_exit(agent_id, code);
            return TerminationOutcome::AlreadyExited { exit_code: code };
        }

        // orphans are reparented once the primary dies
        let descendants = self.inspector.descendants(pid);
        let result = self.escalate(&mut handle, force);
        self.terminate_descendants(agent_id, &descendants);

        let (outcome, exit_code) = match result {
            Some((code, stage)) => (
                TerminationOutcome::Terminated {
                    exit_code: code,
                    stage,
                },
                Some(code),
            ),
            None => (TerminationOutcome::Survived, None),
        };
        if let Err(e) = self.store.mark_cancelled(agent_id, exit_code) {
            warn!(agent_id, "failed to persist cancellation: {}", e);
        }
        outcome
    }

    /// Terminate every tracked agent in id order.
    pub fn terminate_all(&mut self, force: bool) -> Vec<(String, TerminationOutcome)> {
        self.list_tracked()
            .into_iter()
            .map(|agent_id| {
                let outcome = self.terminate(&agent_id, force);
                (agent_id, outcome)
            })
            .collect()
    }

    fn escalate(&self, handle: &mut ProcessHandle, force: bool) -> Option<(i32, SignalStage)> {
        let cfg = &self.config.supervisor;
        let kill = (
            SignalStage::Kill,
            Signal::Kill,
            Duration::from_secs(cfg.kill_timeout_secs),
        );
        let stages = if force {
            vec![kill]
        } else {
            vec![
                (
                    SignalStage::Term,
                    Signal::Term,
                    Duration::from_secs(cfg.term_timeout_secs),
                ),
                (
                    SignalStage::TermRetry,
                    Signal::Term,
                    Duration::from_secs(cfg.retry_term_timeout_secs),
                ),
                kill,
            ]
        };

        for (stage, signal, wait) in stages {
            info!(
                agent_id = %handle.agent_id,
                pid = handle.pid,
                signal = signal.name(),
                "sending signal"
            );
            match send_signal(handle.pid, signal) {
                Ok(true) => {}
                Ok(false) => debug!(pid = handle.pid, "process already gone"),
                Err(e) => warn!(pid = handle.pid, signal = signal.name(), "signal failed: {}", e),
            }
            if let Some(code) = handle.wait_timeout(wait) {
                info!(
                    agent_id = %handle.agent_id,
                    pid = handle.pid,
                    exit_code = code,
                    "agent terminated"
                );
                return Some((code, stage));
            }
        }

        error!(
            agent_id = %handle.agent_id,
            pid = handle.pid,
            "process survived SIGKILL; operator intervention required"
        );
        None
    }

    /// Best-effort TERM, grace period, then KILL for every surviving
    /// descendant, deepest first.
    fn terminate_descendants(&mut self, agent_id: &str, pids: &[u32]) {
        let targets: Vec<u32> = pids
            .iter()
            .rev()
            .copied()
            .filter(|&p| self.process_alive(p))
            .collect();
        if targets.is_empty() {
            return;
        }
        debug!(agent_id, count = targets.len(), "terminating descendants");
        for &pid in &targets {
            if let Err(e) = send_signal(pid, Signal::Term) {
                debug!(pid, "TERM to descendant failed: {}", e);
            }
        }

        let grace = Duration::from_secs(self.config.supervisor.child_grace_secs);
        let deadline = Instant::now() + grace;
        let mut survivors = targets;
        loop {
            survivors.retain(|&pid| self.process_alive(pid));
            if survivors.is_empty() || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(CHILD_POLL);
        }

        for pid in survivors {
            warn!(agent_id, pid, "descendant ignored SIGTERM; sending SIGKILL");
            if let Err(e) = send_signal(pid, Signal::Kill) {
                warn!(agent_id, pid, "SIGKILL to descendant failed: {}", e);
            }
        }
    }

    /// Zombies count as dead: only their own parent can reap them.
    fn process_alive(&mut self, pid: u32) -> bool {
        match self.inspector.inspect(pid) {
            Ok(snapshot) => !snapshot.is_zombie(),
            Err(InspectError::NotFound(_)) => false,
            Err(InspectError::Access { .. }) => is_pid_alive(pid),
        }
    }
}
