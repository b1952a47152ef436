//! Integration tests for retention of terminal state records

use agent_deploy_core::config::RetentionConfig;
use agent_deploy_core::retention::apply_retention;
use agent_deploy_core::schema::{AgentState, AgentStatus};
use agent_deploy_core::{DeploymentLayout, StateStore};
use chrono::{Duration, Utc};
use tempfile::TempDir;

/// Write a record whose terminal timestamp lies `days_ago` in the past.
fn seed_finished(store: &StateStore, agent_id: &str, status: AgentStatus, days_ago: i64) {
    let at = Utc::now() - Duration::days(days_ago);
    let mut record = AgentState::bare(agent_id, status);
    match status {
        AgentStatus::Completed => record.completed_at = Some(at),
        AgentStatus::Failed => record.failed_at = Some(at),
        AgentStatus::Cancelled => record.cancelled_at = Some(at),
        _ => {}
    }
    store.save(&mut record).unwrap();
}

fn seed_running(store: &StateStore, agent_id: &str) {
    store.save(&mut AgentState::bare(agent_id, AgentStatus::Running)).unwrap();
}

fn policy(max_age: &str) -> RetentionConfig {
    RetentionConfig {
        max_age: max_age.to_string(),
        ..RetentionConfig::default()
    }
}

#[test]
fn test_retention_removes_only_old_terminal_records() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));

    seed_finished(&store, "old-done", AgentStatus::Completed, 10);
    seed_finished(&store, "old-failed", AgentStatus::Failed, 10);
    seed_finished(&store, "old-cancelled", AgentStatus::Cancelled, 10);
    seed_finished(&store, "recent-done", AgentStatus::Completed, 3);
    seed_running(&store, "live");

    let result = apply_retention(&store, &policy("7d"), false).unwrap();

    assert_eq!(result.removed, 3);
    assert_eq!(result.kept, 2);
    let remaining = store.list_all().unwrap();
    assert!(remaining.contains_key("recent-done"));
    assert!(remaining.contains_key("live"));
    assert!(!remaining.contains_key("old-failed"));
}

#[test]
fn test_retention_never_removes_non_terminal_records() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));
    seed_running(&store, "r1");
    store.save(&mut AgentState::bare("p1", AgentStatus::Pending)).unwrap();

    let result = apply_retention(&store, &policy("0h"), false).unwrap();

    assert_eq!(result.removed, 0);
    assert_eq!(store.list_all().unwrap().len(), 2);
}

#[test]
fn test_retention_dry_run_keeps_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));
    seed_finished(&store, "old", AgentStatus::Completed, 30);

    let result = apply_retention(&store, &policy("7d"), true).unwrap();

    assert_eq!(result.removed, 1);
    assert_eq!(result.removed_agents, vec!["old".to_string()]);
    assert!(store.load("old").unwrap().is_some());
}

#[test]
fn test_retention_removes_agent_dirs_when_configured() {
    let temp_dir = TempDir::new().unwrap();
    let layout = DeploymentLayout::new(temp_dir.path());
    let store = StateStore::new(layout.clone());
    seed_finished(&store, "old", AgentStatus::Failed, 30);
    std::fs::create_dir_all(layout.agent_dir("old")).unwrap();
    std::fs::write(layout.stdout_log_path("old"), b"log").unwrap();

    let config = RetentionConfig {
        remove_agent_dirs: true,
        ..policy("7d")
    };
    apply_retention(&store, &config, false).unwrap();

    assert!(!layout.agent_dir("old").exists());
}

#[test]
fn test_retention_keeps_agent_dirs_by_default() {
    let temp_dir = TempDir::new().unwrap();
    let layout = DeploymentLayout::new(temp_dir.path());
    let store = StateStore::new(layout.clone());
    seed_finished(&store, "old", AgentStatus::Completed, 30);
    std::fs::create_dir_all(layout.agent_dir("old")).unwrap();

    apply_retention(&store, &policy("7d"), false).unwrap();

    assert!(store.load("old").unwrap().is_none());
    assert!(layout.agent_dir("old").exists());
}

#[test]
fn test_retention_rejects_bad_duration() {
    let temp_dir = TempDir::new().unwrap();
    let store = StateStore::new(DeploymentLayout::new(temp_dir.path()));
    assert!(apply_retention(&store, &policy("forever"), false).is_err());
}

#[test]
fn test_recent_exchanges_survive_sweep() {
    let temp_dir = TempDir::new().unwrap();
    let layout = DeploymentLayout::new(temp_dir.path());
    layout.ensure().unwrap();
    let store = StateStore::new(layout.clone());
    std::fs::write(layout.request_path("req_1"), b"{}").unwrap();
    std::fs::write(layout.response_path("req_1"), b"{}").unwrap();

    let result = apply_retention(&store, &policy("1d"), false).unwrap();
    assert_eq!(result.exchanges_removed, 0);
    assert!(layout.request_path("req_1").exists());

    // Everything is older than zero minutes once a little time has passed
    std::thread::sleep(std::time::Duration::from_millis(20));
    let result = apply_retention(&store, &policy("0m"), false).unwrap();
    assert_eq!(result.exchanges_removed, 1);
    assert!(!layout.request_path("req_1").exists());
    assert!(!layout.response_path("req_1").exists());
}
