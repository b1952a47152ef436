//! Request watcher
//!
//! Consumes `requests/*.json`: every request file gets exactly one response
//! file. `notify` delivers new files promptly and a periodic rescan catches
//! anything the notifier missed (network filesystems, overflowed queues,
//! requests written while the coordinator was down).
//!
//! A request is skipped when its path was already processed by this
//! watcher, or when its response file already exists. The second check is
//! what keeps a restarted coordinator from spawning an answered request
//! again.

use super::{SharedSupervisor, lock_supervisor};
use agent_deploy_core::io::{StoreError, is_temp_file, write_once};
use agent_deploy_core::schema::is_safe_component;
use agent_deploy_core::{DeploymentLayout, DeploymentRequest, DeploymentResponse};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct RequestWatcher {
    layout: DeploymentLayout,
    supervisor: SharedSupervisor,
    processed: HashSet<PathBuf>,
}

impl RequestWatcher {
    pub fn new(layout: DeploymentLayout, supervisor: SharedSupervisor) -> Self {
        Self {
            layout,
            supervisor,
            processed: HashSet::new(),
        }
    }

    pub fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Process every pending request file, oldest name first.
    pub fn scan(&mut self) -> Vec<DeploymentResponse> {
        let dir = self.layout.requests_dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", dir.display(), e);
                return Vec::new();
            }
        };
        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();
        paths.iter().filter_map(|path| self.process_path(path)).collect()
    }

    /// Handle one request file.
    ///
    /// Returns the response written for it, or `None` when the file is not
    /// a request, was already handled, or could not be read yet.
    pub fn process_path(&mut self, path: &Path) -> Option<DeploymentResponse> {
        if !is_request_file(path) || self.processed.contains(path) {
            return None;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                // left unmarked so the next rescan retries it
                warn!("Failed to read request {}: {}", path.display(), e);
                return None;
            }
        };

        let response = match serde_json::from_str::<DeploymentRequest>(&content) {
            Ok(request) => {
                let request_id = response_key(&request.request_id, path);
                if self.already_answered(&request_id, path) {
                    return None;
                }
                info!(
                    request_id = %request.request_id,
                    agent_id = %request.agent_id,
                    parent = %request.parent_agent_id,
                    "Processing deployment request"
                );
                let mut response = lock_supervisor(&self.supervisor).spawn(&request);
                response.request_id = request_id;
                response
            }
            Err(e) => {
                let (request_id, agent_id) = salvage_ids(&content, path);
                if self.already_answered(&request_id, path) {
                    return None;
                }
                warn!(
                    request_id = %request_id,
                    "Malformed deployment request {}: {}",
                    path.display(),
                    e
                );
                DeploymentResponse::failed(
                    &request_id,
                    &agent_id,
                    "Invalid deployment request",
                    format!("failed to parse request: {e}"),
                )
            }
        };

        self.processed.insert(path.to_path_buf());
        self.write_response(&response);
        Some(response)
    }

    fn already_answered(&mut self, request_id: &str, path: &Path) -> bool {
        if self.layout.response_path(request_id).exists() {
            debug!(request_id, "Response already exists; skipping");
            self.processed.insert(path.to_path_buf());
            return true;
        }
        false
    }

    fn write_response(&self, response: &DeploymentResponse) {
        let path = self.layout.response_path(&response.request_id);
        let json = match serde_json::to_vec_pretty(response) {
            Ok(json) => json,
            Err(e) => {
                error!(request_id = %response.request_id, "Failed to serialize response: {}", e);
                return;
            }
        };
        match write_once(&path, &json) {
            Ok(()) => info!(
                request_id = %response.request_id,
                agent_id = %response.agent_id,
                status = %response.status,
                "Wrote deployment response"
            ),
            Err(StoreError::AlreadyExists { .. }) => {
                warn!(
                    request_id = %response.request_id,
                    "Response already written; keeping the first one"
                );
            }
            Err(e) => error!(request_id = %response.request_id, "Failed to write response: {}", e),
        }
    }
}

/// Watch `requests/` until cancelled, processing requests as they appear.
///
/// Runs the watcher on a blocking thread: each request is handled to
/// completion, spawn grace included, before the next one.
pub async fn watch_requests(
    mut watcher: RequestWatcher,
    poll_interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let requests_dir = watcher.layout().requests_dir();
    std::fs::create_dir_all(&requests_dir)
        .with_context(|| format!("Failed to create {}", requests_dir.display()))?;
    info!("Starting request watcher for: {}", requests_dir.display());

    let (tx, rx) = channel();
    let mut fs_watcher: RecommendedWatcher =
        notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(e) = tx.send(event) {
                    debug!("Watcher receiver gone: {}", e);
                }
            }
            Err(e) => error!("File system watcher error: {}", e),
        })
        .context("Failed to create file system watcher")?;

    fs_watcher
        .watch(&requests_dir, RecursiveMode::NonRecursive)
        .context("Failed to watch requests directory")?;

    tokio::task::spawn_blocking(move || {
        // keep the notifier alive for the lifetime of the loop
        let _fs_watcher = fs_watcher;
        watcher.scan();
        let mut last_scan = Instant::now();

        loop {
            if cancel.is_cancelled() {
                info!("Request watcher cancelled");
                break;
            }

            match rx.recv_timeout(poll_interval.min(Duration::from_millis(100))) {
                Ok(event) => {
                    for path in parse_event(&requests_dir, event) {
                        watcher.process_path(&path);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Watcher channel disconnected; falling back to polling");
                    std::thread::sleep(poll_interval);
                }
            }

            if last_scan.elapsed() >= poll_interval {
                watcher.scan();
                last_scan = Instant::now();
            }
        }
    })
    .await
    .context("Watcher task panicked")?;

    Ok(())
}

/// Request files named by a notify event. Only creations and modifications
/// of `.json` files directly inside `requests_dir` count.
pub(crate) fn parse_event(requests_dir: &Path, event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {}
        _ => return Vec::new(),
    }
    event
        .paths
        .into_iter()
        .filter(|path| path.parent() == Some(requests_dir))
        .filter(|path| is_request_file(path))
        .collect()
}

fn is_request_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json") && !is_temp_file(path)
}

/// The id responses are keyed by: the request's own id when usable as a
/// file name, else the request file stem.
fn response_key(request_id: &str, path: &Path) -> String {
    if is_safe_component(request_id) {
        request_id.to_string()
    } else {
        file_stem(path)
    }
}

fn salvage_ids(content: &str, path: &Path) -> (String, String) {
    let value = serde_json::from_str::<serde_json::Value>(content).ok();
    let field = |name: &str| {
        value
            .as_ref()
            .and_then(|v| v.get(name))
            .and_then(|v| v.as_str())
            .filter(|s| is_safe_component(s))
            .map(str::to_string)
    };
    let request_id = field("request_id").unwrap_or_else(|| file_stem(path));
    let agent_id = field("agent_id").unwrap_or_else(|| "unknown".to_string());
    (request_id, agent_id)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}
