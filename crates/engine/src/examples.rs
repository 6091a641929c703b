// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Example agent bodies used by this crate's own tests and by the
//! workspace-level integration suite (`test-support` feature). None of
//! this is part of the orchestration kernel — it plays the role the spec
//! assigns to "the worker bodies themselves" (§1, explicitly out of
//! scope for the core).

use agentry_core::{ProgressReporter, Worker};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Returns the count of primes not exceeding `settings.limit` (default
/// 1000) as a JSON array, so callers can assert on `.len()`. Matches the
/// spec's "Primes inline"/"Primes supervised" end-to-end scenarios
/// (length 168 for limit 1000).
pub struct PrimesWorker;

#[async_trait]
impl Worker for PrimesWorker {
    async fn run(&self, settings: Value, ctx: Arc<dyn ProgressReporter>) -> Result<Value, String> {
        let limit = settings.get("limit").and_then(Value::as_u64).unwrap_or(1000);
        let primes = sieve(limit);
        ctx.progress(Some("sieving"), Some(primes.len() as f64), Some(100.0));
        Ok(json!(primes))
    }
}

fn sieve(limit: u64) -> Vec<u64> {
    if limit < 2 {
        return Vec::new();
    }
    let limit = limit as usize;
    let mut is_composite = vec![false; limit + 1];
    let mut primes = Vec::new();
    for n in 2..=limit {
        if !is_composite[n] {
            primes.push(n as u64);
            let mut m = n * n;
            while m <= limit {
                is_composite[m] = true;
                m += n;
            }
        }
    }
    primes
}

/// Minimal agent meant to be installed on a cron `timing`: returns the
/// current settings echoed back plus a marker field, so a test can assert
/// the cache picks up a fresh value on each firing.
pub struct TimedWorker;

#[async_trait]
impl Worker for TimedWorker {
    async fn run(&self, settings: Value, _ctx: Arc<dyn ProgressReporter>) -> Result<Value, String> {
        Ok(json!({ "ran": true, "settings": settings }))
    }
}

/// Agent body for the spec's error-propagation scenarios. Recognizes:
/// - `{"throw": true}` — returns an error immediately.
/// - `{"wait_ms": N}` — sleeps `N` ms before succeeding, for post-mortem
///   and cancellation-window tests.
/// - `{"exit_code": N}` — not meaningful for the inline runner (that's a
///   supervised-runner concept), surfaced here as an error string
///   carrying the code so inline tests can exercise the same settings
///   shape the supervised fixtures use.
pub struct ErrorsWorker;

#[async_trait]
impl Worker for ErrorsWorker {
    async fn run(&self, settings: Value, _ctx: Arc<dyn ProgressReporter>) -> Result<Value, String> {
        if settings.get("throw").and_then(Value::as_bool).unwrap_or(false) {
            return Err("intentional failure".to_string());
        }
        if let Some(code) = settings.get("exit_code").and_then(Value::as_i64) {
            return Err(format!("exited with code {code}"));
        }
        if let Some(wait_ms) = settings.get("wait_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }
        Ok(Value::Null)
    }
}
