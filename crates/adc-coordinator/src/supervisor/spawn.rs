//! Spawn path: SPAWNING record, agent directory, launch, grace check, RUNNING

use super::Supervisor;
use super::handle::ProcessHandle;
use super::inspect::InspectError;
use super::signal::exit_code_of;
use agent_deploy_core::config::ExecProfile;
use agent_deploy_core::io::{StoreError, atomic_write};
use agent_deploy_core::schema::AgentStatus;
use agent_deploy_core::{AgentState, AgentStatusFile, DeploymentRequest, DeploymentResponse};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::{Child, Command};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

const FAILED_CHILD_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Exited inside the grace interval; a spawn failure, not a runtime one
    #[error("process exited immediately with code {code}")]
    ExitedImmediately { code: i32 },

    #[error("process monitoring failed: {0}")]
    Monitoring(#[from] InspectError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SpawnError {
    /// Short caller-facing message carried in the FAILED response.
    pub fn message(&self) -> &'static str {
        match self {
            SpawnError::Spawn { .. } => "Subprocess spawn failed",
            SpawnError::ExitedImmediately { .. } => "Deployment failed",
            SpawnError::Monitoring(_) => "Process monitoring failed",
            SpawnError::Io { .. } => "OS error during deployment",
            SpawnError::Store(_) => "Deployment failed",
        }
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SpawnError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Resources a failed attempt may need to clean up.
#[derive(Default)]
struct Attempt {
    child: Option<Child>,
    dir_created: bool,
}

impl Supervisor {
    /// Launch the agent described by `request`.
    ///
    /// Always returns a response: RUNNING with the pid, or FAILED with the
    /// durable record moved to FAILED and an `error.log` entry.
    pub fn spawn(&mut self, request: &DeploymentRequest) -> DeploymentResponse {
        if let Err(e) = request.validate() {
            warn!(request_id = %request.request_id, "invalid deployment request: {}", e);
            return DeploymentResponse::failed(
                &request.request_id,
                &request.agent_id,
                "Invalid deployment request",
                e.to_string(),
            );
        }

        if let Some(handle) = self.handles.get_mut(&request.agent_id) {
            match handle.poll() {
                None => {
                    let pid = handle.pid;
                    warn!(
                        agent_id = %request.agent_id,
                        pid,
                        "agent already running; rejecting request"
                    );
                    return DeploymentResponse::failed(
                        &request.request_id,
                        &request.agent_id,
                        "Agent already running",
                        format!("agent {} is already running with pid {}", request.agent_id, pid),
                    );
                }
                Some(code) => {
                    self.handles.remove(&request.agent_id);
                    self.reconcile_exit(&request.agent_id, code);
                }
            }
        }

        match self.store.load(&request.agent_id) {
            Ok(Some(record)) if record.status.is_incomplete() => {
                warn!(
                    agent_id = %request.agent_id,
                    status = %record.status,
                    pid = ?record.pid,
                    "replacing untracked non-terminal record"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(agent_id = %request.agent_id, "could not read existing record: {}", e),
        }

        let mut attempt = Attempt::default();
        match self.try_spawn(request, &mut attempt) {
            Ok(response) => response,
            Err(e) => self.fail_spawn(request, e, attempt),
        }
    }

    fn try_spawn(
        &mut self,
        request: &DeploymentRequest,
        attempt: &mut Attempt,
    ) -> Result<DeploymentResponse, SpawnError> {
        let agent_id = request.agent_id.as_str();
        let mut record = AgentState::from_request(request, AgentStatus::Spawning);
        self.store.save(&mut record)?;

        let agent_dir = self.layout.agent_dir(agent_id);
        fs::create_dir_all(&agent_dir)
            .map_err(|e| SpawnError::io(format!("creating {}", agent_dir.display()), e))?;
        attempt.dir_created = true;

        let prompt_path = self.layout.prompt_path(agent_id);
        fs::write(&prompt_path, &request.prompt)
            .map_err(|e| SpawnError::io(format!("writing {}", prompt_path.display()), e))?;

        let stdout_log = self.layout.stdout_log_path(agent_id);
        let stderr_log = self.layout.stderr_log_path(agent_id);
        let profile = self.config.profile_for(&request.model);
        let mut command = self.build_command(request, &profile, &agent_dir, &prompt_path);
        command
            .stdin(open_file(&prompt_path, false)?)
            .stdout(open_file(&stdout_log, true)?)
            .stderr(open_file(&stderr_log, true)?);

        let child = command.spawn().map_err(|source| SpawnError::Spawn {
            program: profile.program.clone(),
            source,
        })?;
        let pid = child.id();
        let started_at = Utc::now();
        let child = attempt.child.insert(child);
        info!(agent_id, pid, program = %profile.program, "spawned agent process");

        std::thread::sleep(self.config.supervisor.spawn_grace());
        if let Some(status) = child
            .try_wait()
            .map_err(|e| SpawnError::io("polling new process", e))?
        {
            return Err(SpawnError::ExitedImmediately {
                code: exit_code_of(status),
            });
        }

        let snapshot = self.inspector.inspect(pid)?;
        if snapshot.is_zombie() {
            let code = wait_child(child, self.config.supervisor.reap_timeout()).unwrap_or(-1);
            return Err(SpawnError::ExitedImmediately { code });
        }

        let status_file =
            AgentStatusFile::running(agent_id, &request.parent_agent_id, pid, started_at);
        let status_path = self.layout.status_file_path(agent_id);
        let bytes = serde_json::to_vec_pretty(&status_file)
            .map_err(|e| SpawnError::io("serializing status file", std::io::Error::other(e)))?;
        atomic_write(&status_path, &bytes)?;

        self.store.mark_running(agent_id, pid)?;

        let Some(child) = attempt.child.take() else {
            return Err(SpawnError::io("tracking new process", std::io::ErrorKind::NotFound.into()));
        };
        let handle = ProcessHandle::new(
            request.clone(),
            child,
            agent_dir,
            stdout_log,
            stderr_log,
            started_at,
        );
        self.handles.insert(agent_id.to_string(), handle);

        info!(agent_id, pid, request_id = %request.request_id, "agent running");
        Ok(DeploymentResponse::running(&request.request_id, agent_id, pid, started_at))
    }

    fn build_command(
        &self,
        request: &DeploymentRequest,
        profile: &ExecProfile,
        agent_dir: &Path,
        prompt_path: &Path,
    ) -> Command {
        let vars = Placeholders {
            agent_id: &request.agent_id,
            model: &request.model,
            prompt_file: prompt_path,
            agent_dir,
        };
        let mut command = Command::new(vars.apply(&profile.program));
        command.args(profile.args.iter().map(|arg| vars.apply(arg)));
        command.current_dir(agent_dir);

        for (key, value) in self.config.agent.env.iter().chain(profile.env.iter()) {
            command.env(key, vars.apply(value));
        }
        command
            .env("AGENT_ID", &request.agent_id)
            .env("AGENT_NAME", &request.agent_name)
            .env("PARENT_AGENT_ID", &request.parent_agent_id)
            .env("AGENT_TYPE", request.agent_type.as_str())
            .env("MODEL", &request.model)
            .env("AGENT_WORKING_DIR", agent_dir)
            .env("ADC_DEPLOYMENT_DIR", self.layout.root());

        match self.credentials.resolve() {
            Some(credential) => {
                command.env(self.credentials.env_var(), credential.value);
            }
            None => warn!(
                agent_id = %request.agent_id,
                env_var = self.credentials.env_var(),
                "no credential found; agent will start without one"
            ),
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        command
    }

    fn fail_spawn(
        &mut self,
        request: &DeploymentRequest,
        err: SpawnError,
        attempt: Attempt,
    ) -> DeploymentResponse {
        let agent_id = request.agent_id.as_str();
        let message = err.message();
        let detail = err.to_string();
        error!(agent_id, request_id = %request.request_id, "{}: {}", message, detail);

        let mut exit_code = match &err {
            SpawnError::ExitedImmediately { code } => Some(*code),
            _ => None,
        };
        if let Some(mut child) = attempt.child {
            if let Ok(None) = child.try_wait() {
                if let Err(e) = child.kill() {
                    warn!(
                        agent_id,
                        pid = child.id(),
                        "failed to kill partially started process: {}",
                        e
                    );
                }
            }
            let reaped = wait_child(&mut child, FAILED_CHILD_WAIT);
            exit_code = exit_code.or(reaped);
        }

        let error_text = format!("{message}: {detail}");
        match self.store.mark_failed(agent_id, &error_text, exit_code) {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => {
                let mut record = AgentState::from_request(request, AgentStatus::Failed);
                record.failed_at = Some(Utc::now());
                record.error = Some(error_text.clone());
                record.exit_code = exit_code;
                if let Err(e) = self.store.save(&mut record) {
                    error!(agent_id, "failed to persist spawn failure: {}", e);
                }
            }
            Err(e) => error!(agent_id, "failed to persist spawn failure: {}", e),
        }

        if attempt.dir_created {
            append_error_log(&self.layout.error_log_path(agent_id), &error_text);
        }

        DeploymentResponse::failed(&request.request_id, agent_id, message, detail)
    }
}

/// `{agent_id}`, `{model}`, `{prompt_file}` and `{agent_dir}` in profile
/// programs, args and env values.
struct Placeholders<'a> {
    agent_id: &'a str,
    model: &'a str,
    prompt_file: &'a Path,
    agent_dir: &'a Path,
}

impl Placeholders<'_> {
    fn apply(&self, template: &str) -> String {
        template
            .replace("{agent_id}", self.agent_id)
            .replace("{model}", self.model)
            .replace("{prompt_file}", &self.prompt_file.to_string_lossy())
            .replace("{agent_dir}", &self.agent_dir.to_string_lossy())
    }
}

fn open_file(path: &Path, write: bool) -> Result<File, SpawnError> {
    let result = if write {
        OpenOptions::new().create(true).append(true).open(path)
    } else {
        File::open(path)
    };
    result.map_err(|e| SpawnError::io(format!("opening {}", path.display()), e))
}

fn wait_child(child: &mut Child, timeout: Duration) -> Option<i32> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(exit_code_of(status)),
            Ok(None) if Instant::now() < deadline => std::thread::sleep(Duration::from_millis(50)),
            Ok(None) => return None,
            Err(e) => {
                warn!(pid = child.id(), "wait failed: {}", e);
                return None;
            }
        }
    }
}

fn append_error_log(path: &Path, message: &str) {
    let line = format!("{}: {}\n", Utc::now().to_rfc3339(), message);
    let written = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(line.as_bytes()));
    if let Err(e) = written {
        warn!(path = %path.display(), "failed to write error log: {}", e);
    }
}
