// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory agent catalog (spec §2, "Agent registry").
//!
//! `IndexMap` keeps insertion order so `list()` and `refresh` id listings
//! are stable, matching `agentry-core`'s use of `IndexSet` for `methods`.

use agentry_core::{AgentDefinition, AgentId};
use async_trait::async_trait;
use indexmap::IndexMap;

/// Non-fatal problem found while building a registry from discovered
/// definitions (spec §4.1 `refresh`: "warns (non-fatally) on duplicate
/// ids and on definitions missing id/hasReturn/worker").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshWarning {
    pub path: String,
    pub message: String,
}

/// One definition as discovered by an [`AgentSource`], tagged with where
/// it came from so a validation failure can be attributed in a
/// [`RefreshWarning`].
pub struct DiscoveredAgent {
    pub definition: AgentDefinition,
    pub source_path: String,
}

/// External collaborator that enumerates agent definitions (spec §1:
/// "filesystem discovery of agent definition files" is explicitly out of
/// scope for the core). `agentry-loader` provides the reference
/// filesystem-backed implementation; the orchestrator only depends on
/// this trait.
#[async_trait]
pub trait AgentSource: Send + Sync {
    async fn discover(&self) -> Result<Vec<DiscoveredAgent>, String>;
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: IndexMap<String, AgentDefinition>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&AgentDefinition> {
        self.agents.get(id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentDefinition> {
        self.agents.values()
    }

    pub fn insert(&mut self, def: AgentDefinition) {
        self.agents.insert(def.id.to_string(), def);
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Rebuild the registry from a freshly discovered set of definitions.
    ///
    /// Each definition is validated (spec: agents with `timing` need at
    /// least one method; `expires` must parse); invalid or duplicate
    /// definitions are dropped with a warning rather than failing the
    /// whole refresh.
    pub fn rebuild(defs: Vec<DiscoveredAgent>) -> (Self, Vec<RefreshWarning>) {
        let mut registry = Self::new();
        let mut warnings = Vec::new();

        for discovered in defs {
            let DiscoveredAgent {
                definition: def,
                source_path: path,
            } = discovered;
            let id = def.id.to_string();
            if id.trim().is_empty() {
                warnings.push(RefreshWarning {
                    path,
                    message: "agent definition missing 'id'".to_string(),
                });
                continue;
            }
            if registry.has(&id) {
                warnings.push(RefreshWarning {
                    path,
                    message: format!("duplicate agent id '{id}', keeping first registration"),
                });
                continue;
            }
            if let Err(e) = def.validate() {
                warnings.push(RefreshWarning {
                    path,
                    message: e.to_string(),
                });
                continue;
            }
            registry.insert(def);
        }

        (registry, warnings)
    }
}

/// Convenience accessor mirroring [`AgentRegistry::get`] but returning the
/// owned id, for call sites that already hold a borrowed [`AgentId`].
pub fn lookup<'a>(registry: &'a AgentRegistry, id: &AgentId) -> Option<&'a AgentDefinition> {
    registry.get(id.as_str())
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
