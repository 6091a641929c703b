// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache-key derivation (`getKey` in the spec).
//!
//! Equal settings must always derive equal keys regardless of field order,
//! and `$`-prefixed settings are caller-private hints that never enter the
//! hash. See [`derive_cache_key`].

use crate::agent::AgentId;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A hook applied to every derived key before it is returned. Identity by
/// default; see [`crate::config::SchedulerConfig::key_rewrite`].
pub type KeyRewrite = dyn Fn(String) -> String + Send + Sync;

/// Derive the cache key for `(id, settings)`.
///
/// 1. Drop settings keys starting with `$` — caller-private hints.
/// 2. Deeply sort the remainder so key order never perturbs the result.
/// 3. If nothing remains, the key is just `id`; otherwise `id-<sha256>`.
/// 4. Pass the result through `rewrite` (identity if `None`).
pub fn derive_cache_key(id: &AgentId, settings: &Value, rewrite: Option<&KeyRewrite>) -> String {
    let projected = project_public_fields(settings);
    let base = match &projected {
        Value::Object(map) if map.is_empty() => id.to_string(),
        Value::Null => id.to_string(),
        other => {
            let stable = stable_json(other);
            let mut hasher = Sha256::new();
            hasher.update(stable.as_bytes());
            let digest = hasher.finalize();
            format!("{}-{}", id, hex_encode(&digest))
        }
    };
    match rewrite {
        Some(f) => f(base),
        None => base,
    }
}

/// Strip `$`-prefixed keys from every object level of `settings`.
fn project_public_fields(settings: &Value) -> Value {
    match settings {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                if k.starts_with('$') {
                    continue;
                }
                out.insert(k.clone(), project_public_fields(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(project_public_fields).collect()),
        other => other.clone(),
    }
}

/// Serialize `value` with object keys sorted recursively, so semantically
/// equal JSON always produces byte-identical output.
fn stable_json(value: &Value) -> String {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let ordered: BTreeMap<&String, Value> =
                    map.iter().map(|(k, v)| (k, sorted(v))).collect();
                let mut out = serde_json::Map::new();
                for (k, v) in ordered {
                    out.insert(k.clone(), v);
                }
                Value::Object(out)
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
#[path = "cache_key_tests.rs"]
mod tests;
