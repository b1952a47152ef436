//! Integration tests for the lifecycle state store

use agent_deploy_core::schema::{AgentState, AgentStatus, AgentType, DeploymentRequest};
use agent_deploy_core::{DeploymentLayout, StateStore};
use std::collections::{BTreeSet, HashMap};
use tempfile::TempDir;

fn request(agent_id: &str, agent_type: AgentType) -> DeploymentRequest {
    DeploymentRequest {
        request_id: format!("req_{agent_id}"),
        parent_agent_id: "OVERWATCH".to_string(),
        agent_id: agent_id.to_string(),
        agent_name: format!("{agent_id} worker"),
        agent_type,
        model: "haiku".to_string(),
        prompt: "work".to_string(),
        load_percentage: 10.0,
        estimated_duration: None,
        metadata: HashMap::new(),
    }
}

fn seed(store: &StateStore, agent_id: &str, agent_type: AgentType, status: AgentStatus) {
    let mut record = AgentState::from_request(&request(agent_id, agent_type), status);
    store.save(&mut record).unwrap();
}

#[test]
fn test_incomplete_after_restart_matches_non_terminal_set() {
    let temp_dir = TempDir::new().unwrap();
    {
        let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));
        seed(&store, "P1", AgentType::L1, AgentStatus::Pending);
        seed(&store, "S1", AgentType::L2, AgentStatus::Spawning);
        seed(&store, "R1", AgentType::L2, AgentStatus::Running);
        seed(&store, "R2", AgentType::L3, AgentStatus::Running);
        seed(&store, "C1", AgentType::L2, AgentStatus::Running);
        store.mark_completed("C1", 0).unwrap();
        seed(&store, "F1", AgentType::L3, AgentStatus::Spawning);
        store.mark_failed("F1", "boom", None).unwrap();
        seed(&store, "X1", AgentType::L3, AgentStatus::Running);
        store.mark_cancelled("X1", Some(-15)).unwrap();
    }

    // Fresh store instance, same directory
    let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));
    let ids: BTreeSet<String> = store
        .incomplete()
        .unwrap()
        .into_iter()
        .map(|r| r.agent_id)
        .collect();
    let expected: BTreeSet<String> = ["P1", "S1", "R1", "R2"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(ids, expected);

    let summary = store.recovery_summary().unwrap();
    assert_eq!(summary.total_incomplete, 4);
    assert_eq!(summary.by_status["running"], 2);
    assert_eq!(summary.by_status["pending"], 1);
    assert_eq!(summary.by_status["spawning"], 1);
    assert_eq!(summary.by_type["L2"], 2);
    assert_eq!(summary.by_type["L1"], 1);
    assert_eq!(summary.by_type["L3"], 1);
}

#[test]
fn test_list_all_skips_corrupt_records() {
    let temp_dir = TempDir::new().unwrap();
    let layout = DeploymentLayout::new(temp_dir.path());
    let store = StateStore::new(layout.clone());
    seed(&store, "A1", AgentType::L2, AgentStatus::Running);
    std::fs::write(layout.state_path("broken"), b"{not json").unwrap();
    std::fs::write(layout.state_dir().join("notes.txt"), b"ignored").unwrap();

    let all = store.list_all().unwrap();
    assert_eq!(all.len(), 1);
    assert!(all.contains_key("A1"));
}

#[test]
fn test_terminal_timestamps_are_mutually_exclusive() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));

    seed(&store, "A1", AgentType::L2, AgentStatus::Running);
    let completed = store.mark_completed("A1", 0).unwrap();
    assert!(completed.completed_at.is_some());
    assert!(completed.failed_at.is_none());
    assert_eq!(completed.exit_code, Some(0));

    seed(&store, "A2", AgentType::L2, AgentStatus::Running);
    let failed = store.mark_failed("A2", "Process exited with code 3", Some(3)).unwrap();
    assert!(failed.failed_at.is_some());
    assert!(failed.completed_at.is_none());
    assert_eq!(failed.error.as_deref(), Some("Process exited with code 3"));
}

#[test]
fn test_status_sequence_never_leaves_terminal() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));
    seed(&store, "A1", AgentType::L2, AgentStatus::Spawning);

    store.mark_running("A1", 4242).unwrap();
    store.mark_cancelled("A1", Some(0)).unwrap();
    for next in [
        AgentStatus::Running,
        AgentStatus::Completed,
        AgentStatus::Failed,
        AgentStatus::Cancelled,
    ] {
        assert!(store.transition("A1", next, |_| {}).is_err());
    }

    let record = store.load("A1").unwrap().unwrap();
    assert_eq!(record.status, AgentStatus::Cancelled);
    assert_eq!(record.pid, Some(4242));
}

#[test]
fn test_delete_is_irreversible_and_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));
    seed(&store, "A1", AgentType::L1, AgentStatus::Running);

    assert!(store.delete("A1").unwrap());
    assert!(!store.delete("A1").unwrap());
    assert!(store.load("A1").unwrap().is_none());
}

#[test]
fn test_hidden_agent_id_is_never_persisted() {
    let temp_dir = TempDir::new().unwrap();
    let layout = DeploymentLayout::new(temp_dir.path());
    let store = StateStore::new(layout.clone());

    let mut hidden = AgentState::from_request(&request(".A1", AgentType::L2), AgentStatus::Running);
    assert!(store.save(&mut hidden).is_err());
    assert!(!layout.state_path(".A1").exists());

    seed(&store, "A1", AgentType::L2, AgentStatus::Running);
    let ids: Vec<String> = store.incomplete().unwrap().into_iter().map(|r| r.agent_id).collect();
    assert_eq!(ids, vec!["A1".to_string()]);
}

#[test]
fn test_delete_succeeds_when_lock_file_cannot_be_removed() {
    let temp_dir = TempDir::new().unwrap();
    let layout = DeploymentLayout::new(temp_dir.path());
    let store = StateStore::new(layout.clone());
    seed(&store, "A1", AgentType::L1, AgentStatus::Completed);

    let lock_path = layout.lock_path("A1");
    std::fs::remove_file(&lock_path).unwrap();
    std::fs::create_dir(&lock_path).unwrap();

    assert!(store.delete("A1").unwrap());
    assert!(store.load("A1").unwrap().is_none());
    assert!(lock_path.is_dir());
}
