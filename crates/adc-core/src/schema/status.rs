//! Agent lifecycle status and tier enums

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Lifecycle state of a deployed agent.
///
/// ```text
/// PENDING ─▶ SPAWNING ─▶ RUNNING ─▶ { COMPLETED | FAILED | CANCELLED }
/// ```
///
/// The three terminal states are absorbing. Any non-terminal state may jump
/// straight to a terminal one (a spawn failure goes `SPAWNING → FAILED`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Request accepted, nothing started yet
    Pending,
    /// Working directory and process are being prepared
    Spawning,
    /// Process verified alive after the spawn grace interval
    Running,
    /// Process exited with code 0
    Completed,
    /// Spawn failed or process exited non-zero
    Failed,
    /// Terminated on request
    Cancelled,
}

impl AgentStatus {
    /// Returns `true` for `COMPLETED`, `FAILED` and `CANCELLED`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` for the states a restarted coordinator must reconcile.
    pub fn is_incomplete(self) -> bool {
        !self.is_terminal()
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Spawning => 1,
            Self::Running => 2,
            Self::Completed | Self::Failed | Self::Cancelled => 3,
        }
    }

    /// Whether a persisted record in `self` may be re-saved as `next`.
    ///
    /// Re-saving the same non-terminal state is allowed (progress updates).
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Spawning => "spawning",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Agent hierarchy tier.
///
/// Unknown tiers are kept verbatim so a request from a newer parent still
/// parses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentType {
    L1,
    L2,
    L3,
    Other(String),
}

impl AgentType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for AgentType {
    fn from(s: &str) -> Self {
        match s {
            "L1" => Self::L1,
            "L2" => Self::L2,
            "L3" => Self::L3,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for AgentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AgentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&AgentStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&AgentStatus::Cancelled).unwrap(), "\"cancelled\"");
        assert_eq!(
            serde_json::from_str::<AgentStatus>("\"running\"").unwrap(),
            AgentStatus::Running
        );
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        for terminal in [AgentStatus::Completed, AgentStatus::Failed, AgentStatus::Cancelled] {
            for next in [
                AgentStatus::Pending,
                AgentStatus::Spawning,
                AgentStatus::Running,
                AgentStatus::Completed,
                AgentStatus::Failed,
                AgentStatus::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(AgentStatus::Pending.can_transition_to(AgentStatus::Spawning));
        assert!(AgentStatus::Spawning.can_transition_to(AgentStatus::Running));
        assert!(AgentStatus::Spawning.can_transition_to(AgentStatus::Failed));
        assert!(AgentStatus::Running.can_transition_to(AgentStatus::Running));
        assert!(AgentStatus::Running.can_transition_to(AgentStatus::Cancelled));
        assert!(!AgentStatus::Running.can_transition_to(AgentStatus::Spawning));
        assert!(!AgentStatus::Spawning.can_transition_to(AgentStatus::Pending));
    }

    #[test]
    fn test_incomplete() {
        assert!(AgentStatus::Pending.is_incomplete());
        assert!(AgentStatus::Spawning.is_incomplete());
        assert!(AgentStatus::Running.is_incomplete());
        assert!(!AgentStatus::Failed.is_incomplete());
    }

    #[test]
    fn test_agent_type_known_and_unknown() {
        assert_eq!(serde_json::from_str::<AgentType>("\"L2\"").unwrap(), AgentType::L2);
        let other: AgentType = serde_json::from_str("\"OVERWATCH\"").unwrap();
        assert_eq!(other, AgentType::Other("OVERWATCH".to_string()));
        assert_eq!(serde_json::to_string(&other).unwrap(), "\"OVERWATCH\"");
    }
}
