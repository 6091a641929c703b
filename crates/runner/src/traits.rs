// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The runner contract (spec §6: `{ name, exec(session) -> promise<value> }`).

use crate::error::RunnerError;
use agentry_cache::CacheBackend;
use agentry_core::{AgentDefinition, ProgressReporter, Session};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Executes one session against its resolved agent and cache backend.
///
/// On success, writes the result to `cache` under `session.cache_key`
/// subject to the agent's `has_return`/`expires` fields, then returns the
/// value (`None` when `has_return` is false). On failure, the cache is left
/// untouched and a [`RunnerError`] is returned.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Stable name this runner is registered under (matches an agent's
    /// `methods` entries and `runner.modules`).
    fn name(&self) -> &str;

    async fn exec(
        &self,
        session: &Session,
        agent: &AgentDefinition,
        cache: Arc<dyn CacheBackend>,
        ctx: Arc<dyn ProgressReporter>,
    ) -> Result<Option<Value>, RunnerError>;

    /// Release any resources held by the runner (child processes,
    /// supervisor connections). Idempotent. Default no-op.
    async fn destroy(&self) -> Result<(), RunnerError> {
        Ok(())
    }
}
