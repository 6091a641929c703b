// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory [`CacheBackend`], the reference implementation used by tests
//! and by default `cache.modules` configurations.
//!
//! Cloning creates a new handle onto the same underlying store.

use crate::backend::{CacheBackend, CacheEntryMeta, CacheError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Clone)]
struct StoredEntry {
    value: Value,
    created_at: SystemTime,
    expires_at: Option<SystemTime>,
}

impl StoredEntry {
    fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// In-memory cache backend, safe for concurrent use via [`DashMap`].
#[derive(Clone)]
pub struct MemoryCache {
    name: String,
    data: Arc<DashMap<String, StoredEntry>>,
}

impl MemoryCache {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Arc::new(DashMap::new()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let now = SystemTime::now();
        match self.data.get(key) {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                self.data.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Value,
        expires_at: Option<SystemTime>,
    ) -> Result<(), CacheError> {
        self.data.insert(
            key.to_string(),
            StoredEntry {
                value,
                created_at: SystemTime::now(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn unset(&self, key: &str) -> Result<(), CacheError> {
        self.data.remove(key);
        Ok(())
    }

    async fn size(&self, key: &str) -> Result<Option<u64>, CacheError> {
        let now = SystemTime::now();
        match self.data.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let bytes = serde_json::to_vec(&entry.value)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(bytes.len() as u64))
            }
            _ => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<CacheEntryMeta>, CacheError> {
        let now = SystemTime::now();
        let mut out = Vec::new();
        for entry in self.data.iter() {
            if entry.is_expired(now) {
                continue;
            }
            let bytes = serde_json::to_vec(&entry.value)
                .map_err(|e| CacheError::Serialization(e.to_string()))?;
            out.push(CacheEntryMeta {
                id: entry.key().clone(),
                size: bytes.len() as u64,
                created_at: entry.created_at,
                expires_at: entry.expires_at,
            });
        }
        Ok(out)
    }

    async fn destroy(&self) -> Result<(), CacheError> {
        self.data.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
