// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cache backend contract (spec §6).

use async_trait::async_trait;
use serde_json::Value;
use std::time::SystemTime;
use thiserror::Error;

/// Errors a [`CacheBackend`] may surface. These propagate to the
/// initiating request and reject the session's defer (spec §7).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(String),

    #[error("cache serialization error: {0}")]
    Serialization(String),

    #[error("cache backend '{0}' is not initialized")]
    NotInitialized(String),
}

/// Metadata record for a single enumerated key, as returned by
/// [`CacheBackend::list`].
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntryMeta {
    pub id: String,
    pub size: u64,
    pub created_at: SystemTime,
    pub expires_at: Option<SystemTime>,
}

/// Key→value store with TTL, size query, enumeration, and unset.
///
/// Implementations must be safe for concurrent use: the orchestrator and
/// every runner treat the cache as the only cross-process channel between
/// a worker and the caller, so reads issued after an observed successful
/// write must see that write (spec §5 ordering guarantees).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Stable name this backend is registered under (matches `cache.modules`
    /// entries and a session's resolved `cache` field).
    fn name(&self) -> &str;

    /// Prepare the backend for use (open files, connect, etc.).
    async fn init(&self) -> Result<(), CacheError>;

    /// Fetch the stored value, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Durably store `value` under `key`. `expires_at`, if set, is a wall
    /// clock instant after which [`CacheBackend::get`] must report absence.
    async fn set(
        &self,
        key: &str,
        value: Value,
        expires_at: Option<SystemTime>,
    ) -> Result<(), CacheError>;

    /// Idempotent delete.
    async fn unset(&self, key: &str) -> Result<(), CacheError>;

    /// Approximate byte size of the stored value, or `None` if absent.
    async fn size(&self, key: &str) -> Result<Option<u64>, CacheError>;

    /// Enumerate all live (non-expired) entries.
    async fn list(&self) -> Result<Vec<CacheEntryMeta>, CacheError>;

    /// Release any resources held by the backend. Idempotent.
    async fn destroy(&self) -> Result<(), CacheError>;
}
