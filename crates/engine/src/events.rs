// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator event stream (spec §6, "Events").
//!
//! Events are a best-effort broadcast for external listeners (the CLI's
//! `--verbose` flag, log shippers, test assertions); nothing in the
//! orchestrator's own correctness depends on a subscriber being present,
//! so a full channel just drops the oldest event rather than blocking a
//! session.

use agentry_core::SessionId;
use tokio::sync::broadcast;

/// One emission from the orchestrator. Mirrors the named events in the
/// spec's external-interfaces section.
#[derive(Debug, Clone)]
pub enum Event {
    Init,
    Ready,
    Destroy,
    Destroyed,
    Refresh(Vec<String>),
    RefreshWarn { path: String, message: String },
    Tick(String),
    Scheduled(String),
    RunImmediate(String),
    Run { session_id: SessionId, agent_id: String, cache_key: String },
    Log { session_id: SessionId, message: String },
    Warn { session_id: SessionId, message: String },
}

/// A fixed-capacity broadcast of [`Event`]s. Cloning shares the same
/// underlying channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: Event) {
        // No subscribers is the common case outside tests; ignore.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
