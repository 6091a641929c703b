// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A scriptable [`Supervisor`] double, exposed under `test-support` for use
//! by this crate's own tests and by downstream crates exercising the
//! supervised-runner code path without a real process manager.

use super::{ProcessDescriptor, ProcessSpec, ProcessStatus, Supervisor};
use crate::error::RunnerError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

/// One process's scripted lifecycle: a queue of statuses `describe` pops
/// from (repeating the last entry once exhausted), with the previous pid
/// retained between calls so callers only need to change what differs.
#[derive(Clone)]
struct Script {
    pid: u32,
    queue: VecDeque<ProcessStatus>,
}

#[derive(Default)]
struct State {
    scripts: std::collections::HashMap<String, Script>,
    pending: std::collections::HashMap<String, Script>,
    started: Vec<(String, ProcessSpec)>,
    deleted: Vec<String>,
    connected: bool,
    disconnected: bool,
}

/// A fake supervisor whose process statuses are scripted ahead of time via
/// [`FakeSupervisor::script`].
pub struct FakeSupervisor {
    state: Mutex<State>,
    log_file_path: Option<PathBuf>,
}

impl FakeSupervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            log_file_path: None,
        })
    }

    pub fn with_log_file(log_file_path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            log_file_path: Some(log_file_path),
        })
    }

    /// Queues the sequence of statuses `describe` will report for
    /// `proc_name` once it has been started, one per call, holding the
    /// last status once exhausted. Mirrors a real supervisor: a process
    /// name nobody has started yet describes as absent, so this does not
    /// take effect until [`Supervisor::start`] is called for the same
    /// name.
    pub fn script(&self, proc_name: &str, pid: u32, statuses: impl IntoIterator<Item = ProcessStatus>) {
        let mut state = self.state.lock();
        state.pending.insert(
            proc_name.to_string(),
            Script {
                pid,
                queue: statuses.into_iter().collect(),
            },
        );
    }

    /// Registers a process that is already running under `proc_name`
    /// before any `start()` call, for exercising the supervised runner's
    /// stale-process cleanup path.
    pub fn preexisting(&self, proc_name: &str, pid: u32, status: ProcessStatus) {
        let mut state = self.state.lock();
        state.scripts.insert(
            proc_name.to_string(),
            Script {
                pid,
                queue: VecDeque::from([status]),
            },
        );
    }

    pub fn start_calls(&self) -> Vec<(String, ProcessSpec)> {
        self.state.lock().started.clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    pub fn was_connected(&self) -> bool {
        self.state.lock().connected
    }

    pub fn was_disconnected(&self) -> bool {
        self.state.lock().disconnected
    }
}

#[async_trait::async_trait]
impl Supervisor for FakeSupervisor {
    async fn connect(&self) -> Result<(), RunnerError> {
        self.state.lock().connected = true;
        Ok(())
    }

    async fn describe(&self, proc_name: &str) -> Result<Option<ProcessDescriptor>, RunnerError> {
        let mut state = self.state.lock();
        let Some(script) = state.scripts.get_mut(proc_name) else {
            return Ok(None);
        };
        let status = if script.queue.len() > 1 {
            script
                .queue
                .pop_front()
                .unwrap_or(ProcessStatus::Launching)
        } else {
            script.queue.front().cloned().unwrap_or(ProcessStatus::Launching)
        };
        Ok(Some(ProcessDescriptor {
            status,
            pid: script.pid,
        }))
    }

    async fn start(&self, proc_name: &str, spec: ProcessSpec) -> Result<(), RunnerError> {
        let mut state = self.state.lock();
        state.started.push((proc_name.to_string(), spec));
        if let Some(script) = state.pending.remove(proc_name) {
            state.scripts.insert(proc_name.to_string(), script);
        }
        Ok(())
    }

    async fn delete(&self, proc_name: &str) -> Result<(), RunnerError> {
        let mut state = self.state.lock();
        state.deleted.push(proc_name.to_string());
        state.scripts.remove(proc_name);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), RunnerError> {
        self.state.lock().disconnected = true;
        Ok(())
    }

    fn log_file_path(&self) -> Option<PathBuf> {
        self.log_file_path.clone()
    }
}
