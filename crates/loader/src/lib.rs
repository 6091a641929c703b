// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agentry-loader: a filesystem-backed [`agentry_engine::AgentSource`]
//! (spec §1: "filesystem discovery of agent definition files" is an
//! external collaborator to the orchestration kernel).
//!
//! A worker body is Rust code (`Arc<dyn Worker>`), not data, so this
//! loader cannot synthesize one from a file. Instead each `*.toml` file
//! supplies everything about an agent *except* its executable body —
//! `timing`, `expires`, `has_return`, `immediate`, `methods`, `show`,
//! `clear_on_build` — and [`FileAgentSource`] is constructed with a map
//! of already-registered worker bodies, keyed by the same `id` the file
//! declares. A file naming an id with no matching worker is skipped with
//! a warning rather than failing the whole discovery pass, mirroring the
//! spec's treatment of "malformed agent file" as non-fatal.

use agentry_core::{AgentDefaults, AgentDefinition, AgentId, Worker};
use agentry_engine::{AgentSource, DiscoveredAgent};
use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },
}

/// On-disk shape of an agent definition file. Every field is optional so
/// `agent_defaults` (spec §6) can fill in the rest; only `id` is truly
/// required, and even that failure is reported as a discovery warning
/// rather than a hard error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct AgentFile {
    id: Option<String>,
    timing: Option<String>,
    expires: Option<String>,
    has_return: Option<bool>,
    immediate: Option<bool>,
    methods: Vec<String>,
    show: Option<bool>,
    clear_on_build: Option<bool>,
}

/// Discovers agent definitions from `*.toml` files across a set of glob
/// patterns, merging in `agent_defaults` and binding each discovered
/// definition to a caller-supplied [`Worker`] by id.
pub struct FileAgentSource {
    patterns: Vec<String>,
    workers: IndexMap<String, Arc<dyn Worker>>,
    defaults: AgentDefaults,
}

impl FileAgentSource {
    pub fn new(patterns: Vec<String>, workers: IndexMap<String, Arc<dyn Worker>>) -> Self {
        Self {
            patterns,
            workers,
            defaults: AgentDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: AgentDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    fn merge_defaults(&self, file: AgentFile) -> AgentFile {
        AgentFile {
            id: file.id,
            timing: file.timing,
            expires: file.expires.or_else(|| self.defaults.expires.clone()),
            has_return: file.has_return.or(self.defaults.has_return),
            immediate: file.immediate,
            methods: file.methods,
            show: file.show.or(self.defaults.show),
            clear_on_build: file.clear_on_build,
        }
    }

    async fn load_one(&self, path: PathBuf) -> Result<Option<DiscoveredAgent>, String> {
        let path_str = path.display().to_string();
        let bytes = match tokio::fs::read_to_string(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(path = %path_str, error = %e, "failed to read agent definition file");
                return Ok(None);
            }
        };
        let parsed: AgentFile = match toml::from_str(&bytes) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(path = %path_str, error = %e, "failed to parse agent definition file");
                return Ok(None);
            }
        };
        let file = self.merge_defaults(parsed);

        let Some(id) = file.id.filter(|id| !id.trim().is_empty()) else {
            tracing::warn!(path = %path_str, "agent definition file missing 'id'");
            return Ok(None);
        };

        let Some(worker) = self.workers.get(&id).cloned() else {
            tracing::warn!(path = %path_str, agent = %id, "no worker registered for agent id, skipping");
            return Ok(None);
        };

        if file.has_return.is_none() {
            tracing::warn!(
                path = %path_str,
                agent = %id,
                "agent definition file missing 'has_return', defaulting to true"
            );
        }

        let methods: IndexSet<String> = file.methods.into_iter().collect();
        let definition = AgentDefinition {
            id: AgentId::new(id),
            worker,
            timing: file.timing,
            expires: file.expires,
            has_return: file.has_return.unwrap_or(true),
            immediate: file.immediate.unwrap_or(false),
            methods,
            show: file.show.unwrap_or(true),
            clear_on_build: file.clear_on_build.unwrap_or(false),
        };

        Ok(Some(DiscoveredAgent {
            definition,
            source_path: path_str,
        }))
    }
}

#[async_trait]
impl AgentSource for FileAgentSource {
    async fn discover(&self) -> Result<Vec<DiscoveredAgent>, String> {
        let mut paths = Vec::new();
        for pattern in &self.patterns {
            let entries = glob::glob(pattern).map_err(|e| {
                LoaderError::InvalidGlob {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }
                .to_string()
            })?;
            for entry in entries {
                match entry {
                    Ok(path) => paths.push(path),
                    Err(e) => tracing::warn!(error = %e, "glob entry error while scanning agent definitions"),
                }
            }
        }

        let mut discovered = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(agent) = self.load_one(path).await? {
                discovered.push(agent);
            }
        }
        Ok(discovered)
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
