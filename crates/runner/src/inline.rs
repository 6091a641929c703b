// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process runner (spec §4.5.a).

use crate::error::RunnerError;
use crate::traits::Runner;
use agentry_cache::CacheBackend;
use agentry_core::{AgentDefinition, ProgressReporter, Session};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;

/// Invokes the worker body directly within the caller's async task.
#[derive(Default)]
pub struct InlineRunner;

#[async_trait]
impl Runner for InlineRunner {
    fn name(&self) -> &str {
        "inline"
    }

    async fn exec(
        &self,
        session: &Session,
        agent: &AgentDefinition,
        cache: Arc<dyn CacheBackend>,
        ctx: Arc<dyn ProgressReporter>,
    ) -> Result<Option<Value>, RunnerError> {
        let result = agent
            .worker
            .run(session.agent_settings.clone(), ctx)
            .await
            .map_err(RunnerError::Worker)?;

        if !agent.has_return {
            return Ok(None);
        }

        let expires_at = agent
            .expires_duration()
            .map_err(|e| RunnerError::InvalidExpiry(e.to_string()))?
            .map(|d| SystemTime::now() + d);

        cache.set(&session.cache_key, result.clone(), expires_at).await?;
        Ok(Some(result))
    }
}

#[cfg(test)]
#[path = "inline_tests.rs"]
mod tests;
