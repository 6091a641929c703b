// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator configuration surface (spec §6).

use crate::cache_key::KeyRewrite;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Serializable subset of the configuration surface: the knobs a caller
/// plausibly wants to load from a TOML file. Non-serializable pieces
/// (`key_rewrite`, the runner/cache selection hooks) live on
/// [`SchedulerConfig`] directly and default to sensible behavior when a
/// `SchedulerConfig` is built from a [`SchedulerConfigFile`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfigFile {
    pub auto_init: bool,
    pub auto_install: bool,
    pub allow_immediate: bool,
    pub check_process_ms: u64,
    pub log_throttle_ms: u64,
    pub paths: Vec<String>,
    pub agent_defaults: AgentDefaults,
}

impl Default for SchedulerConfigFile {
    fn default() -> Self {
        Self {
            auto_init: true,
            auto_install: true,
            allow_immediate: true,
            check_process_ms: 1000,
            log_throttle_ms: 250,
            paths: Vec::new(),
            agent_defaults: AgentDefaults::default(),
        }
    }
}

/// Defaults merged into each discovered agent definition before it is
/// registered (the `agentDefaults` key in §6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentDefaults {
    pub expires: Option<String>,
    pub has_return: Option<bool>,
    pub show: Option<bool>,
}

/// Full in-memory configuration, including the non-serializable hooks.
/// Built from a [`SchedulerConfigFile`] via [`SchedulerConfig::from_file`]
/// or assembled programmatically with [`SchedulerConfig::default`].
#[derive(Clone)]
pub struct SchedulerConfig {
    pub auto_init: bool,
    pub auto_install: bool,
    pub allow_immediate: bool,
    pub check_process: Duration,
    pub log_throttle: Duration,
    pub paths: Vec<String>,
    pub agent_defaults: AgentDefaults,
    /// Applied to every derived cache key. Identity by default.
    pub key_rewrite: Option<Arc<KeyRewrite>>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_file(SchedulerConfigFile::default())
    }
}

impl SchedulerConfig {
    pub fn from_file(file: SchedulerConfigFile) -> Self {
        Self {
            auto_init: file.auto_init,
            auto_install: file.auto_install,
            allow_immediate: file.allow_immediate,
            check_process: Duration::from_millis(file.check_process_ms),
            log_throttle: Duration::from_millis(file.log_throttle_ms),
            paths: file.paths,
            agent_defaults: file.agent_defaults,
            key_rewrite: None,
        }
    }

    pub fn with_key_rewrite(mut self, rewrite: Arc<KeyRewrite>) -> Self {
        self.key_rewrite = Some(rewrite);
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
