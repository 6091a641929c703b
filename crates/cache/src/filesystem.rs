// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed [`CacheBackend`]: one JSON file per key under a root
//! directory, named by a hash of the key so arbitrary key characters never
//! touch the filesystem.

use crate::backend::{CacheBackend, CacheEntryMeta, CacheError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Serialize, Deserialize)]
struct StoredFile {
    key: String,
    value: serde_json::Value,
    created_at: SystemTime,
    expires_at: Option<SystemTime>,
}

impl StoredFile {
    fn is_expired(&self, now: SystemTime) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Cache backend that persists each entry as a JSON file under `root`.
pub struct FilesystemCache {
    name: String,
    root: PathBuf,
}

impl FilesystemCache {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for b in digest {
            use std::fmt::Write;
            let _ = write!(hex, "{:02x}", b);
        }
        self.root.join(format!("{hex}.json"))
    }

    async fn read_file(&self, path: &Path) -> Result<Option<StoredFile>, CacheError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let stored: StoredFile = serde_json::from_slice(&bytes)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(stored))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e.to_string())),
        }
    }
}

#[async_trait]
impl CacheBackend for FilesystemCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CacheError::Io(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let path = self.path_for(key);
        match self.read_file(&path).await? {
            Some(stored) if !stored.is_expired(SystemTime::now()) => Ok(Some(stored.value)),
            Some(_) => {
                let _ = tokio::fs::remove_file(&path).await;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: serde_json::Value,
        expires_at: Option<SystemTime>,
    ) -> Result<(), CacheError> {
        let stored = StoredFile {
            key: key.to_string(),
            value,
            created_at: SystemTime::now(),
            expires_at,
        };
        let bytes =
            serde_json::to_vec(&stored).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::Io(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| CacheError::Io(e.to_string()))
    }

    async fn unset(&self, key: &str) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e.to_string())),
        }
    }

    async fn size(&self, key: &str) -> Result<Option<u64>, CacheError> {
        let path = self.path_for(key);
        match self.read_file(&path).await? {
            Some(stored) if !stored.is_expired(SystemTime::now()) => {
                let bytes = serde_json::to_vec(&stored.value)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                Ok(Some(bytes.len() as u64))
            }
            _ => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<CacheEntryMeta>, CacheError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(CacheError::Io(e.to_string())),
        };
        let now = SystemTime::now();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::Io(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stored) = self.read_file(&path).await? {
                if stored.is_expired(now) {
                    continue;
                }
                let bytes = serde_json::to_vec(&stored.value)
                    .map_err(|e| CacheError::Serialization(e.to_string()))?;
                out.push(CacheEntryMeta {
                    id: stored.key,
                    size: bytes.len() as u64,
                    created_at: stored.created_at,
                    expires_at: stored.expires_at,
                });
            }
        }
        Ok(out)
    }

    async fn destroy(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "filesystem_tests.rs"]
mod tests;
