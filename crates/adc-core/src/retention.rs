//! Retention policy for terminal lifecycle records
//!
//! Terminal records (completed, failed, cancelled) older than the configured
//! age are deleted from `state/`. Non-terminal records are never touched:
//! they are the recovery set. Request/response pairs whose response is older
//! than the same age are swept too, request first, so a surviving request
//! always still has its response and is never processed twice.

use crate::config::RetentionConfig;
use crate::layout::DeploymentLayout;
use crate::state::StateStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of applying retention to a deployment root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionResult {
    /// State records kept (including every non-terminal record)
    pub kept: usize,
    /// Terminal state records removed (or that would be, in dry-run)
    pub removed: usize,
    /// Agent ids of the removed records
    pub removed_agents: Vec<String>,
    /// Request/response pairs removed
    pub exchanges_removed: usize,
}

/// Apply retention policy to the state store
///
/// # Arguments
///
/// * `store` - State store of the deployment root
/// * `policy` - Retention configuration to apply
/// * `dry_run` - If true, report what would be removed without deleting
///
/// # Errors
///
/// Returns error if `policy.max_age` does not parse or the state directory
/// cannot be listed. Individual delete failures are logged and skipped.
pub fn apply_retention(
    store: &StateStore,
    policy: &RetentionConfig,
    dry_run: bool,
) -> Result<RetentionResult> {
    let max_age = parse_duration(&policy.max_age)?;
    let now = Utc::now();
    let records = store.list_all().context("Failed to list state records")?;

    let mut result = RetentionResult::default();
    for (agent_id, record) in records {
        let expired = record.status.is_terminal()
            && record
                .finished_at()
                .map(|at| is_expired(at, max_age, now))
                .unwrap_or(false);

        if !expired {
            result.kept += 1;
            continue;
        }

        if dry_run {
            result.removed += 1;
            result.removed_agents.push(agent_id);
            continue;
        }

        match store.delete(&agent_id) {
            Ok(_) => {
                if policy.remove_agent_dirs {
                    remove_agent_dir(store.layout(), &agent_id);
                }
                debug!(
                    agent_id = %agent_id,
                    status = %record.status,
                    "removed expired state record"
                );
                result.removed += 1;
                result.removed_agents.push(agent_id);
            }
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "failed to delete expired state record");
                result.kept += 1;
            }
        }
    }

    result.exchanges_removed = clean_exchanges(store.layout(), &max_age, dry_run)?;

    if result.removed > 0 || result.exchanges_removed > 0 {
        info!(
            removed = result.removed,
            kept = result.kept,
            exchanges_removed = result.exchanges_removed,
            dry_run,
            "retention sweep finished"
        );
    }
    Ok(result)
}

fn is_expired(at: DateTime<Utc>, max_age: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(at) > max_age
}

fn remove_agent_dir(layout: &DeploymentLayout, agent_id: &str) {
    let dir = layout.agent_dir(agent_id);
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(&dir) {
            warn!("Failed to remove agent directory {}: {}", dir.display(), e);
        }
    }
}

/// Remove request/response pairs whose response file is older than `max_age`.
fn clean_exchanges(layout: &DeploymentLayout, max_age: &Duration, dry_run: bool) -> Result<usize> {
    let responses_dir = layout.responses_dir();
    if !responses_dir.exists() {
        return Ok(0);
    }

    let now = Utc::now();
    let mut removed = 0;

    let entries = fs::read_dir(&responses_dir).with_context(|| {
        format!("Failed to read response directory: {}", responses_dir.display())
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(request_id) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix("_response.json"))
        else {
            continue;
        };

        if !modified_before(&path, max_age, now) {
            continue;
        }
        if dry_run {
            removed += 1;
            continue;
        }

        let request = layout.request_path(request_id);
        if let Err(e) = fs::remove_file(&request) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to delete request file {}: {}", request.display(), e);
                continue;
            }
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to delete response file {}: {}", path.display(), e),
        }
    }

    Ok(removed)
}

fn modified_before(path: &Path, max_age: &Duration, now: DateTime<Utc>) -> bool {
    match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => {
            let modified: DateTime<Utc> = modified.into();
            now.signed_duration_since(modified) > *max_age
        }
        Err(e) => {
            warn!("Failed to get metadata for {}: {}", path.display(), e);
            false
        }
    }
}

/// Parse duration string into chrono::Duration
///
/// Supports formats like:
/// - "7d" -> 7 days
/// - "24h" -> 24 hours
/// - "30m" -> 30 minutes
/// - "0h" -> zero (everything terminal is expired)
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    let (num_part, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => (&s[..idx], &s[idx..]),
        None => anyhow::bail!("Duration must have a unit (m, h or d): {s}"),
    };

    let num: i64 = num_part
        .parse()
        .with_context(|| format!("Invalid number in duration: {s}"))?;

    match unit {
        "m" => Ok(Duration::minutes(num)),
        "h" => Ok(Duration::hours(num)),
        "d" => Ok(Duration::days(num)),
        _ => anyhow::bail!("Unknown duration unit '{unit}'. Use 'm', 'h' or 'd'"),
    }
}
