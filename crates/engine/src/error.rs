// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator-level errors (spec §7): definition, selection, and
//! compatibility errors are raised here; runner and cache errors are
//! wrapped from their source crates via `#[from]`.

use agentry_cache::CacheError;
use agentry_runner::RunnerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("agent '{0}' has no selectable runner")]
    NoSelectableRunner(String),

    #[error("unknown runner '{0}'")]
    UnknownRunner(String),

    #[error("agent '{0}' has no selectable cache")]
    NoSelectableCache(String),

    #[error("unknown cache '{0}'")]
    UnknownCache(String),

    #[error("runner '{requested}' is not in agent '{agent}' methods {methods:?}")]
    RunnerNotCompatible {
        agent: String,
        requested: String,
        methods: Vec<String>,
    },

    #[error("agent '{0}' definition is invalid: {1}")]
    InvalidDefinition(String, #[source] agentry_core::CoreError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A run failed or was rejected as reported by a coalesced outcome
    /// (the leader's own [`RunnerError`] has already been flattened to a
    /// string by the time it reaches a follower, so this carries text
    /// rather than a typed source).
    #[error("{0}")]
    Run(String),

    #[error("no session found for cache key '{0}'")]
    NoSuchSession(String),

    #[error("invalid cron expression '{0}': {1}")]
    InvalidCron(String, String),
}

impl EngineError {
    /// Short stringified cause, as the spec requires for every
    /// user-visible failure surface (§7: "a rejected promise carrying a
    /// descriptive string").
    pub fn short(&self) -> String {
        self.to_string()
    }
}
