// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session factory (spec §4.2, `createSession`).

use crate::error::EngineError;
use crate::registry::AgentRegistry;
use agentry_cache::CacheBackend;
use agentry_core::{derive_cache_key, AgentDefinition, KeyRewrite, Session};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// Caller-supplied overrides for a single `createSession` call, mirroring
/// the orchestrator's `opts` (spec §4.2 step 3/5: "explicit override").
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    pub cache_key: Option<String>,
    pub runner: Option<String>,
    pub cache: Option<String>,
}

/// Selection hooks and registries session creation needs. Held by the
/// orchestrator and threaded through by reference so this module stays
/// free of orchestrator-wide locking concerns.
pub struct SessionFactory<'a> {
    pub registry: &'a AgentRegistry,
    pub caches: &'a IndexMap<String, Arc<dyn CacheBackend>>,
    pub runners: &'a IndexMap<String, Arc<dyn agentry_runner::Runner>>,
    pub cache_select: &'a (dyn Fn(&AgentDefinition, &Value) -> Option<String> + Send + Sync),
    pub runner_select: &'a (dyn Fn(&AgentDefinition, &Value) -> Option<String> + Send + Sync),
    pub key_rewrite: Option<&'a KeyRewrite>,
}

impl<'a> SessionFactory<'a> {
    /// Build a [`Session`] for `(id, settings)`, resolving runner, cache,
    /// and cache key per spec §4.2.
    pub fn create(
        &self,
        id: &str,
        settings: Value,
        overrides: SessionOverrides,
    ) -> Result<(Session, Arc<AgentDefinition>), EngineError> {
        let agent = self
            .registry
            .get(id)
            .ok_or_else(|| EngineError::UnknownAgent(id.to_string()))?;
        let agent = Arc::new(agent.clone());

        let runner_name = overrides
            .runner
            .or_else(|| (self.runner_select)(&agent, &settings))
            .ok_or_else(|| EngineError::NoSelectableRunner(id.to_string()))?;
        if !self.runners.contains_key(&runner_name) {
            return Err(EngineError::UnknownRunner(runner_name));
        }
        if !agent.methods.is_empty() && !agent.methods.iter().any(|m| m == &runner_name) {
            return Err(EngineError::RunnerNotCompatible {
                agent: id.to_string(),
                requested: runner_name,
                methods: agent.methods.iter().cloned().collect(),
            });
        }

        let cache_name = overrides
            .cache
            .or_else(|| (self.cache_select)(&agent, &settings))
            .ok_or_else(|| EngineError::NoSelectableCache(id.to_string()))?;
        if !self.caches.contains_key(&cache_name) {
            return Err(EngineError::UnknownCache(cache_name));
        }

        let cache_key = overrides.cache_key.unwrap_or_else(|| {
            derive_cache_key(&agent.id, &settings, self.key_rewrite)
        });

        let session = Session::new(agent.id.clone(), settings, cache_key, runner_name, cache_name);
        Ok((session, agent))
    }
}
