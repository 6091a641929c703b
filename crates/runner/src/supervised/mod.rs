// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External-process runner (spec §4.5.b) — the largest single component in
//! this crate. Delegates a run to a child process started and tracked by
//! an external supervisor, polls the supervisor for status, and performs
//! a log post-mortem to tell a clean worker exit apart from a silent
//! supervisor-initiated kill.

pub mod postmortem;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use crate::error::RunnerError;
use crate::traits::Runner;
use agentry_cache::CacheBackend;
use agentry_core::{AgentDefinition, ProgressReporter, Session};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Status a supervisor reports for a named process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    Launching,
    Online,
    Stopping,
    Stopped { exit_code: i32 },
    Errored,
    Unknown(String),
}

/// A snapshot of a named process, as returned by [`Supervisor::describe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    pub status: ProcessStatus,
    pub pid: u32,
}

/// Everything the supervisor needs to start the child.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub exec_file: String,
    pub interpreter: Option<String>,
    pub interpreter_args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

/// The external process manager contract (spec §6, "Runner contract" +
/// §4.5.b protocol). The concrete supervisor is an external collaborator;
/// [`fake::FakeSupervisor`] (under `test-support`) is a deterministic
/// double used by this crate's and the engine crate's tests.
#[async_trait]
pub trait Supervisor: Send + Sync {
    async fn connect(&self) -> Result<(), RunnerError>;
    async fn describe(&self, proc_name: &str) -> Result<Option<ProcessDescriptor>, RunnerError>;
    async fn start(&self, proc_name: &str, spec: ProcessSpec) -> Result<(), RunnerError>;
    async fn delete(&self, proc_name: &str) -> Result<(), RunnerError>;
    async fn disconnect(&self) -> Result<(), RunnerError>;

    /// Path to the supervisor's aggregate log file, used for the
    /// post-mortem. `None` disables the post-mortem step entirely.
    fn log_file_path(&self) -> Option<PathBuf> {
        None
    }
}

/// Configuration for [`SupervisedRunner`].
#[derive(Clone)]
pub struct SupervisedConfig {
    pub check_process: Duration,
    pub log_tail_size: u64,
    pub log_scan_enabled: bool,
    pub exec_file: String,
    pub interpreter: Option<String>,
    pub interpreter_args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub proc_name: Arc<dyn Fn(&str) -> String + Send + Sync>,
    pub env: Arc<dyn Fn(&Session) -> HashMap<String, String> + Send + Sync>,
}

impl Default for SupervisedConfig {
    fn default() -> Self {
        Self {
            check_process: Duration::from_millis(1000),
            log_tail_size: 2048,
            log_scan_enabled: true,
            exec_file: "agentry-runner-child".to_string(),
            interpreter: None,
            interpreter_args: Vec::new(),
            cwd: None,
            proc_name: Arc::new(|cache_key| format!("agentry-{cache_key}")),
            env: Arc::new(|_session| HashMap::new()),
        }
    }
}

/// Runs the worker as a child process under an external supervisor.
pub struct SupervisedRunner<S: Supervisor> {
    supervisor: Arc<S>,
    config: SupervisedConfig,
}

impl<S: Supervisor> SupervisedRunner<S> {
    pub fn new(supervisor: Arc<S>, config: SupervisedConfig) -> Self {
        Self { supervisor, config }
    }

    fn env_for(&self, session: &Session, agent: &AgentDefinition) -> HashMap<String, String> {
        let mut env = (self.config.env)(session);
        env.insert("AGENTRY_AGENT_ID".to_string(), agent.id.to_string());
        env.insert(
            "AGENTRY_AGENT_SETTINGS".to_string(),
            session.agent_settings.to_string(),
        );
        env.insert("AGENTRY_CACHE".to_string(), session.cache.clone());
        env.insert("AGENTRY_IS_AGENT_RUN".to_string(), "1".to_string());
        env
    }
}

#[async_trait]
impl<S: Supervisor + 'static> Runner for SupervisedRunner<S> {
    fn name(&self) -> &str {
        "supervised"
    }

    async fn exec(
        &self,
        session: &Session,
        agent: &AgentDefinition,
        cache: Arc<dyn CacheBackend>,
        ctx: Arc<dyn ProgressReporter>,
    ) -> Result<Option<Value>, RunnerError> {
        let proc_name = (self.config.proc_name)(&session.cache_key);

        self.supervisor.connect().await?;

        let outcome = self.run_and_poll(session, agent, &proc_name, &ctx).await;

        // Cleanup and cache-read happen regardless of polling outcome, and
        // regardless of each other's success (spec step 7: "two activities
        // occur in parallel" — modeled here as best-effort-then-join since
        // cleanup failures are swallowed as warnings either way).
        let delete_result = self.supervisor.delete(&proc_name).await;
        if let Err(e) = delete_result {
            ctx.warn(&format!("failed to delete supervised process: {e}"));
        }
        let disconnect_result = self.supervisor.disconnect().await;
        if let Err(e) = disconnect_result {
            ctx.warn(&format!("failed to disconnect from supervisor: {e}"));
        }

        let outcome = outcome?;
        if !agent.has_return {
            return Ok(None);
        }
        match outcome {
            PollOutcome::Success => {
                let value = cache.get(&session.cache_key).await?;
                Ok(value)
            }
        }
    }
}

enum PollOutcome {
    /// The child terminated cleanly (or the post-mortem found nothing
    /// incriminating); the child is contracted to have already written
    /// its result into the cache.
    Success,
}

impl<S: Supervisor> SupervisedRunner<S> {
    async fn run_and_poll(
        &self,
        session: &Session,
        agent: &AgentDefinition,
        proc_name: &str,
        ctx: &Arc<dyn ProgressReporter>,
    ) -> Result<PollOutcome, RunnerError> {
        if let Some(existing) = self.supervisor.describe(proc_name).await? {
            let _ = existing;
            ctx.warn(&format!(
                "process '{proc_name}' already exists, deleting stale instance"
            ));
            self.supervisor.delete(proc_name).await?;
        }

        let spec = ProcessSpec {
            exec_file: self.config.exec_file.clone(),
            interpreter: self.config.interpreter.clone(),
            interpreter_args: self.config.interpreter_args.clone(),
            cwd: self.config.cwd.clone(),
            env: self.env_for(session, agent),
        };
        self.supervisor.start(proc_name, spec).await?;

        let start = truncate_to_whole_second(SystemTime::now());

        loop {
            let descriptor = self.supervisor.describe(proc_name).await?;
            match classify(descriptor) {
                Classification::StillRunning => {
                    tokio::time::sleep(self.config.check_process).await;
                    continue;
                }
                Classification::CleanExit => {
                    if self.config.log_scan_enabled {
                        if let Some(log_path) = self.supervisor.log_file_path() {
                            let verdict = postmortem::run(
                                &log_path,
                                self.config.log_tail_size,
                                descriptor_pid(proc_name, &self.supervisor).await?,
                                proc_name,
                                start,
                            )
                            .await;
                            match verdict {
                                Ok(postmortem::Verdict::Clean) => return Ok(PollOutcome::Success),
                                Ok(postmortem::Verdict::Killed(reason)) => {
                                    return Err(RunnerError::PostMortem(reason))
                                }
                                Err(e) => {
                                    ctx.warn(&format!("post-mortem log scan failed: {e}"));
                                    return Ok(PollOutcome::Success);
                                }
                            }
                        }
                    }
                    return Ok(PollOutcome::Success);
                }
                Classification::NonZeroExit(code) => {
                    let log_path = self
                        .supervisor
                        .log_file_path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "<no log configured>".to_string());
                    return Err(RunnerError::NonZeroExit { code, log_path });
                }
                Classification::Errored => {
                    return Err(RunnerError::Supervisor(format!(
                        "process '{proc_name}' errored"
                    )))
                }
                Classification::Unknown(status) => {
                    return Err(RunnerError::UnknownStatus(status))
                }
            }
        }
    }
}

async fn descriptor_pid<S: Supervisor>(proc_name: &str, supervisor: &S) -> Result<u32, RunnerError> {
    Ok(supervisor
        .describe(proc_name)
        .await?
        .map(|d| d.pid)
        .unwrap_or(0))
}

enum Classification {
    StillRunning,
    CleanExit,
    NonZeroExit(i32),
    Errored,
    Unknown(String),
}

/// Classify a poll tick per spec §4.5.b step 6.
fn classify(descriptor: Option<ProcessDescriptor>) -> Classification {
    let Some(descriptor) = descriptor else {
        return Classification::Unknown("missing".to_string());
    };
    match (&descriptor.status, descriptor.pid) {
        (ProcessStatus::Launching, _) => Classification::StillRunning,
        (ProcessStatus::Online, 0) => Classification::CleanExit, // supervisor quirk
        (ProcessStatus::Online, _) => Classification::StillRunning,
        (ProcessStatus::Stopping, _) | (ProcessStatus::Stopped { .. }, _) => {
            match &descriptor.status {
                ProcessStatus::Stopped { exit_code } if *exit_code == 0 => Classification::CleanExit,
                ProcessStatus::Stopped { exit_code } => Classification::NonZeroExit(*exit_code),
                // Still "Stopping": treat like still-running; caller polls again.
                _ => Classification::StillRunning,
            }
        }
        (ProcessStatus::Errored, _) => Classification::Errored,
        (ProcessStatus::Unknown(s), _) => Classification::Unknown(s.clone()),
    }
}

fn truncate_to_whole_second(t: SystemTime) -> SystemTime {
    match t.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => SystemTime::UNIX_EPOCH + Duration::from_secs(d.as_secs()),
        Err(_) => t,
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
