//! Integration tests for the adc CLI

use agent_deploy_core::schema::{AgentState, AgentStatus, AgentStatusFile};
use agent_deploy_core::{DeploymentLayout, StateStore};
use assert_cmd::cargo;
use chrono::{Duration, Utc};
use predicates::str::contains;
use std::path::PathBuf;
use tempfile::TempDir;

/// Point the CLI at a sandboxed home. The working directory is a subdirectory
/// so a `.adc.toml` in the repository cannot leak into the test.
fn adc(temp_dir: &TempDir) -> assert_cmd::Command {
    let workdir = temp_dir.path().join("workdir");
    std::fs::create_dir_all(&workdir).ok();
    let mut cmd = cargo::cargo_bin_cmd!("adc");
    cmd.env("ADC_HOME", temp_dir.path())
        .env_remove("ADC_DEPLOYMENT_DIR")
        .env_remove("ADC_AGENT_PROGRAM")
        .env_remove("AGENT_ID")
        .current_dir(&workdir);
    cmd
}

/// Default deployment root under the sandboxed home.
fn root(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join(".agent-deploy")
}

fn store(temp_dir: &TempDir) -> StateStore {
    StateStore::new(DeploymentLayout::new(root(temp_dir)))
}

fn save(temp_dir: &TempDir, agent_id: &str, status: AgentStatus) -> AgentState {
    let mut record = AgentState::bare(agent_id, status);
    record.agent_type = "L2".into();
    record.parent_agent_id = "OVERWATCH".to_string();
    store(temp_dir).save(&mut record).unwrap();
    record
}

fn write_status_file(temp_dir: &TempDir, agent_id: &str, parent: &str) {
    let layout = DeploymentLayout::new(root(temp_dir));
    let mut file = AgentStatusFile::running(agent_id, parent, 4242, Utc::now());
    file.progress = 30;
    let path = layout.status_file_path(agent_id);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string(&file).unwrap()).unwrap();
}

#[test]
fn test_deploy_without_coordinator_times_out() {
    let temp_dir = TempDir::new().unwrap();

    adc(&temp_dir)
        .args(["deploy", "--agent-id", "A1", "--name", "Worker"])
        .args(["--prompt", "do it", "--timeout", "1"])
        .args(["--meta", "priority=high"])
        .assert()
        .failure()
        .stdout(contains("Deployment timeout"))
        .stderr(contains("Deployment of A1 failed"));

    // the request stays queued for a coordinator that starts later
    let requests: Vec<_> = std::fs::read_dir(root(&temp_dir).join("requests"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&requests[0]).unwrap()).unwrap();
    assert_eq!(body["agent_id"], "A1");
    assert_eq!(body["parent_agent_id"], "cli");
    assert_eq!(body["agent_type"], "L3");
    assert_eq!(body["metadata"]["priority"], "high");
}

#[test]
fn test_deploy_uses_explicit_deployment_dir_and_prompt_file() {
    let temp_dir = TempDir::new().unwrap();
    let custom = temp_dir.path().join("custom-root");
    let prompt = temp_dir.path().join("prompt.md");
    std::fs::write(&prompt, "long task").unwrap();

    adc(&temp_dir)
        .arg("--deployment-dir")
        .arg(&custom)
        .args(["deploy", "--agent-id", "P1", "--name", "Prompted"])
        .args(["--parent", "L1.main", "--json", "--timeout", "1"])
        .arg("--prompt-file")
        .arg(&prompt)
        .assert()
        .failure()
        .stdout(contains("\"status\": \"failed\""));

    let request = std::fs::read_dir(custom.join("requests"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap()
        .path();
    let body: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(request).unwrap()).unwrap();
    assert_eq!(body["prompt"], "long task");
    assert_eq!(body["parent_agent_id"], "L1.main");
}

#[test]
fn test_deploy_requires_a_prompt() {
    let temp_dir = TempDir::new().unwrap();
    adc(&temp_dir)
        .args(["deploy", "--agent-id", "A1", "--name", "Worker"])
        .assert()
        .failure()
        .stderr(contains("--prompt"));
}

#[test]
fn test_status_shows_record_and_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    save(&temp_dir, "S1", AgentStatus::Running);
    write_status_file(&temp_dir, "S1", "OVERWATCH");

    adc(&temp_dir)
        .args(["status", "S1"])
        .assert()
        .success()
        .stdout(contains("Status:    running"))
        .stdout(contains("Progress:  30%"));

    adc(&temp_dir)
        .args(["status", "S1", "--json"])
        .assert()
        .success()
        .stdout(contains("\"state\""))
        .stdout(contains("\"status_file\""));
}

#[test]
fn test_status_unknown_agent_fails() {
    let temp_dir = TempDir::new().unwrap();
    adc(&temp_dir)
        .args(["status", "ghost"])
        .assert()
        .failure()
        .stderr(contains("not found"));
}

#[test]
fn test_list_filters_by_parent() {
    let temp_dir = TempDir::new().unwrap();

    adc(&temp_dir).arg("list").assert().success().stdout(contains("No agents found"));

    write_status_file(&temp_dir, "mine", "L1.main");
    write_status_file(&temp_dir, "theirs", "L1.other");
    save(&temp_dir, "mine", AgentStatus::Running);

    adc(&temp_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(contains("mine"))
        .stdout(contains("theirs"));

    let output = adc(&temp_dir)
        .args(["list", "--parent", "L1.main"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    assert!(text.contains("mine"));
    assert!(!text.contains("theirs"));
}

#[test]
fn test_recovery_check_list_and_clear() {
    let temp_dir = TempDir::new().unwrap();
    save(&temp_dir, "r1", AgentStatus::Running);
    save(&temp_dir, "s1", AgentStatus::Spawning);
    save(&temp_dir, "done", AgentStatus::Completed);

    adc(&temp_dir)
        .args(["recovery", "check"])
        .assert()
        .success()
        .stdout(contains("Incomplete agents: 2"));

    adc(&temp_dir)
        .args(["recovery", "list"])
        .assert()
        .success()
        .stdout(contains("r1"))
        .stdout(contains("s1"));

    adc(&temp_dir)
        .args(["recovery", "clear"])
        .assert()
        .failure()
        .stderr(contains("--yes"));

    adc(&temp_dir)
        .args(["recovery", "clear", "--agent-id", "done"])
        .assert()
        .failure()
        .stderr(contains("not incomplete"));

    adc(&temp_dir)
        .args(["recovery", "clear", "--agent-id", "r1"])
        .assert()
        .success()
        .stdout(contains("Cleared r1"));

    adc(&temp_dir)
        .args(["recovery", "clear", "--yes"])
        .assert()
        .success()
        .stdout(contains("Cleared 1 incomplete record(s)"));

    let remaining = store(&temp_dir).list_all().unwrap();
    assert_eq!(remaining.keys().cloned().collect::<Vec<_>>(), vec!["done".to_string()]);
}

#[test]
fn test_cleanup_removes_old_finished_records() {
    let temp_dir = TempDir::new().unwrap();
    let mut old = AgentState::bare("old", AgentStatus::Completed);
    old.completed_at = Some(Utc::now() - Duration::days(10));
    store(&temp_dir).save(&mut old).unwrap();
    save(&temp_dir, "live", AgentStatus::Running);

    adc(&temp_dir)
        .args(["cleanup", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("DRY RUN"))
        .stdout(contains("Would remove 1 finished agent record(s), kept 1"));
    assert!(store(&temp_dir).load("old").unwrap().is_some());

    adc(&temp_dir)
        .arg("cleanup")
        .assert()
        .success()
        .stdout(contains("Removed 1 finished agent record(s), kept 1"));
    assert!(store(&temp_dir).load("old").unwrap().is_none());
    assert!(store(&temp_dir).load("live").unwrap().is_some());
}

#[test]
fn test_cleanup_rejects_bad_max_age() {
    let temp_dir = TempDir::new().unwrap();
    adc(&temp_dir)
        .args(["cleanup", "--max-age", "soon"])
        .assert()
        .failure();
}
