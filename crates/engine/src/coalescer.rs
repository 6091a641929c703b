// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coalescer (spec §4.4): at most one execution in flight per cache key.
//!
//! Concurrent callers that land on the same `cacheKey` while a worker is
//! already running subscribe to the same [`tokio::sync::broadcast`]
//! channel instead of starting a second worker. The map entry is removed
//! only after the broadcast send, so a reader that calls `get` right
//! after its `run` resolves is guaranteed to see the coalescer report the
//! key as no-longer-in-flight (spec §5 ordering guarantees).

use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

/// The terminal outcome of a coalesced run, cloned to every waiter.
pub type SessionOutcome = Result<Option<Value>, String>;

struct InFlight {
    tx: broadcast::Sender<SessionOutcome>,
}

/// Maps `cacheKey -> in-flight execution`.
#[derive(Default)]
pub struct Coalescer {
    inflight: DashMap<String, Arc<InFlight>>,
}

/// What the caller should do after attempting to join on a cache key.
pub enum Join {
    /// No execution was in flight; the caller is now the leader and owns
    /// `tx` — it must eventually call [`Coalescer::finish`].
    Leader(broadcast::Sender<SessionOutcome>),
    /// An execution is already in flight; `rx` will receive its outcome.
    Follower(broadcast::Receiver<SessionOutcome>),
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, cache_key: &str) -> bool {
        self.inflight.contains_key(cache_key)
    }

    /// Atomically check whether `cache_key` is in flight and, if not,
    /// register this caller as the leader.
    pub fn join(&self, cache_key: &str) -> Join {
        use dashmap::mapref::entry::Entry;
        match self.inflight.entry(cache_key.to_string()) {
            Entry::Occupied(entry) => Join::Follower(entry.get().tx.subscribe()),
            Entry::Vacant(entry) => {
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(Arc::new(InFlight { tx: tx.clone() }));
                Join::Leader(tx)
            }
        }
    }

    /// Resolve the in-flight entry for `cache_key` and remove it from the
    /// map. Must be called exactly once by the leader, regardless of
    /// outcome, so waiters are never left hanging.
    pub fn finish(&self, cache_key: &str, outcome: SessionOutcome) {
        if let Some((_, entry)) = self.inflight.remove(cache_key) {
            // A send error just means every follower already dropped its
            // receiver (no one was waiting); the leader's own caller still
            // got its result via the initial subscribe before `finish`.
            let _ = entry.tx.send(outcome);
        }
    }

    pub fn len(&self) -> usize {
        self.inflight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inflight.is_empty()
    }
}
