// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identifiers and the immutable agent definition.

use crate::error::CoreError;
use async_trait::async_trait;
use indexmap::IndexSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

crate::define_id! {
    /// Unique identifier for a registered agent.
    pub struct AgentId;
}

/// Ordered, deduplicated set of runner names an agent is compatible with.
///
/// Order matters: [`crate::session::Session`] resolution picks the first
/// entry that also names an enabled runner.
pub type Methods = IndexSet<String>;

/// Per-run capability object handed to a worker body.
///
/// Mirrors what the engine crate's concrete `WorkerContext` exposes, kept
/// here as a trait so this crate (and anything testing a [`Worker`] in
/// isolation) never needs to depend on the cache or engine crates.
pub trait ProgressReporter: Send + Sync {
    /// Emit a log line attributed to the running session.
    fn log(&self, message: &str);

    /// Emit a warning line attributed to the running session.
    fn warn(&self, message: &str);

    /// Leading-edge-then-throttled variant of [`ProgressReporter::log`].
    fn log_throttled(&self, message: &str);

    /// Report progress; see the orchestrator documentation for how the
    /// `(text, current, max)` combination is rendered.
    fn progress(&self, text: Option<&str>, current: Option<f64>, max: Option<f64>);
}

/// A computation registered under an [`AgentId`].
///
/// `Worker::run` takes the caller-supplied settings and a capability object
/// and produces either a JSON value (written to the cache by the chosen
/// runner, subject to `has_return`) or a short error string.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn run(
        &self,
        settings: serde_json::Value,
        ctx: Arc<dyn ProgressReporter>,
    ) -> Result<serde_json::Value, String>;
}

/// Immutable catalog entry. Constructed once at registration time and never
/// mutated afterwards; sessions hold an `Arc` pointer into the registry.
#[derive(Clone)]
pub struct AgentDefinition {
    pub id: AgentId,
    pub worker: Arc<dyn Worker>,
    /// Cron expression (five- or six-field). Validated by the engine's
    /// scheduler, not here — this crate doesn't depend on a cron parser.
    pub timing: Option<String>,
    /// Raw duration string (e.g. `"1h"`), parsed on demand via [`AgentDefinition::expires_duration`].
    pub expires: Option<String>,
    pub has_return: bool,
    pub immediate: bool,
    pub methods: Methods,
    pub show: bool,
    pub clear_on_build: bool,
}

impl fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("id", &self.id)
            .field("timing", &self.timing)
            .field("expires", &self.expires)
            .field("has_return", &self.has_return)
            .field("immediate", &self.immediate)
            .field("methods", &self.methods)
            .field("show", &self.show)
            .field("clear_on_build", &self.clear_on_build)
            .finish_non_exhaustive()
    }
}

impl AgentDefinition {
    /// Validate the invariants from the data model: a timed agent must
    /// declare at least one method, and `expires` (if present) must parse.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.timing.is_some() && self.methods.is_empty() {
            return Err(CoreError::TimedAgentWithoutMethods(self.id.to_string()));
        }
        if let Some(expires) = &self.expires {
            self.parse_expires(expires)?;
        }
        Ok(())
    }

    /// Parse [`AgentDefinition::expires`] into a [`Duration`], if present.
    pub fn expires_duration(&self) -> Result<Option<Duration>, CoreError> {
        match &self.expires {
            Some(raw) => Ok(Some(self.parse_expires(raw)?)),
            None => Ok(None),
        }
    }

    fn parse_expires(&self, raw: &str) -> Result<Duration, CoreError> {
        let duration = humantime::parse_duration(raw).map_err(|e| CoreError::InvalidExpiry {
            value: raw.to_string(),
            reason: e.to_string(),
        })?;
        if duration.is_zero() {
            return Err(CoreError::InvalidExpiry {
                value: raw.to_string(),
                reason: "must be a positive duration".to_string(),
            });
        }
        Ok(duration)
    }

    /// The first method in [`AgentDefinition::methods`] that also names an
    /// enabled runner, or `None` if none match.
    pub fn first_enabled_method<'a>(
        &'a self,
        enabled_runners: impl Fn(&str) -> bool,
    ) -> Option<&'a str> {
        self.methods
            .iter()
            .map(|m| m.as_str())
            .find(|m| enabled_runners(m))
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
