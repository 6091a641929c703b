// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cron scheduler (spec §4.7): installs one periodic task per timed
//! agent and fires `run(agentId)` fire-and-forget on each tick.
//!
//! Accepts both five-field (`min hour dom month dow`) and six-field
//! (`sec min hour dom month dow`) expressions, since the `cron` crate
//! itself only parses the six-field form — a bare five-field string is
//! promoted by prefixing a `"0"` seconds field.

use chrono::Utc;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum CronError {
    #[error("invalid cron expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },
}

/// Parse a five- or six-field cron expression into a [`Schedule`].
pub fn parse_schedule(expr: &str) -> Result<Schedule, CronError> {
    let field_count = expr.split_whitespace().count();
    let normalized = if field_count == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| CronError::InvalidExpression {
        expr: expr.to_string(),
        reason: e.to_string(),
    })
}

/// Owns the background tasks installed for each timed agent. Dropping (or
/// calling [`CronScheduler::stop`]) cancels every task cooperatively —
/// pending ticks never enqueue new work once cancellation fires, but a
/// tick already dispatched to `run` is not aborted mid-flight (spec §5:
/// "destroy is a cooperative stop").
pub struct CronScheduler {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl CronScheduler {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Install a periodic task for `agent_id` on `schedule`. `on_tick` is
    /// invoked fire-and-forget on every firing and must not panic across
    /// ticks (a single firing failing must not stop the task, per spec).
    pub fn install<F, Fut>(&mut self, agent_id: String, schedule: Schedule, on_tick: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let token = self.token.clone();
        let on_tick = Arc::new(on_tick);
        let handle = tokio::spawn(async move {
            loop {
                let Some(next) = schedule.upcoming(Utc).next() else {
                    break;
                };
                let now = Utc::now();
                let delay = (next - now)
                    .to_std()
                    .unwrap_or(std::time::Duration::from_secs(0));

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                let id = agent_id.clone();
                let tick = Arc::clone(&on_tick);
                tokio::spawn(async move {
                    tick(id).await;
                });
            }
        });
        self.handles.push(handle);
    }

    /// Cooperative stop: no new ticks fire after this returns; in-flight
    /// `on_tick` invocations already spawned are left to finish.
    pub fn stop(&mut self) {
        self.token.cancel();
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CronScheduler {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
#[path = "cron_tests.rs"]
mod tests;
