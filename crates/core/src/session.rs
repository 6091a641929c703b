// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session data record.
//!
//! A [`Session`] is created once per live request by the engine crate's
//! session factory and is the record the orchestrator hands back to callers
//! who ask for `want: "session"`. The in-flight defer/broadcast plumbing
//! that resolves a session lives in the engine crate's coalescer — this
//! type only carries the data the spec describes.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::SystemTime;

crate::define_id! {
    /// Unique identifier for a session (distinct from the cache key, which
    /// may be shared by sessions created from different calls that happen
    /// to coalesce).
    pub struct SessionId;
}

/// Lifecycle status of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Complete,
    Error,
}

/// A short progress snapshot, mirrored into the cache at
/// `"<cache_key>-progress"` by the engine's worker context.
///
/// Wire shape is `{text, current}` (spec §6, "Persisted state"): `current`
/// is an integer percentage, not a raw counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub text: Option<String>,
    pub current: Option<u8>,
}

/// One per live (id, settings) request.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub agent_id: AgentId,
    pub agent_settings: Value,
    pub cache_key: String,
    pub runner: String,
    pub cache: String,
    pub start_time: SystemTime,
    pub status: SessionStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub progress: Option<ProgressSnapshot>,
}

impl Session {
    pub fn new(
        agent_id: AgentId,
        agent_settings: Value,
        cache_key: String,
        runner: String,
        cache: String,
    ) -> Self {
        Self {
            id: SessionId::new(uuid::Uuid::new_v4().to_string()),
            agent_id,
            agent_settings,
            cache_key,
            runner,
            cache,
            start_time: SystemTime::now(),
            status: SessionStatus::Pending,
            result: None,
            error: None,
            progress: None,
        }
    }

    pub fn mark_complete(&mut self, result: Value) {
        self.status = SessionStatus::Complete;
        self.result = Some(result);
        self.error = None;
    }

    pub fn mark_error(&mut self, error: impl Into<String>) {
        self.status = SessionStatus::Error;
        self.error = Some(error.into());
        self.result = None;
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
