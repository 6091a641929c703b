// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session [`ProgressReporter`] (spec §3 "WorkerContext", §4.6).

use crate::events::{Event, EventBus};
use agentry_cache::CacheBackend;
use agentry_core::{ProgressReporter, ProgressSnapshot, SessionId};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

/// Capability object handed to a worker body for the lifetime of one
/// session. Cheap to clone (an `Arc` around it is what workers actually
/// receive, per [`agentry_core::Worker::run`]'s signature).
pub struct WorkerContext {
    session_id: SessionId,
    cache_key: String,
    cache: Arc<dyn CacheBackend>,
    events: EventBus,
    log_throttle: Duration,
    last_log: Mutex<Option<Instant>>,
    last_progress_write: Mutex<Option<Instant>>,
}

/// Progress records live at `"<cacheKey>-progress"` with a 30-minute TTL
/// (spec §4.6: "load-bearing for stale detection").
const PROGRESS_TTL: Duration = Duration::from_secs(30 * 60);

impl WorkerContext {
    pub fn new(
        session_id: SessionId,
        cache_key: String,
        cache: Arc<dyn CacheBackend>,
        events: EventBus,
        log_throttle: Duration,
    ) -> Self {
        Self {
            session_id,
            cache_key,
            cache,
            events,
            log_throttle,
            last_log: Mutex::new(None),
            last_progress_write: Mutex::new(None),
        }
    }

    fn progress_key(&self) -> String {
        format!("{}-progress", self.cache_key)
    }

    fn throttled(gate: &Mutex<Option<Instant>>, window: Duration) -> bool {
        let now = Instant::now();
        let mut last = gate.lock();
        let allow = match *last {
            None => true,
            Some(t) => now.duration_since(t) >= window,
        };
        if allow {
            *last = Some(now);
        }
        allow
    }

    fn write_progress(&self, snapshot: ProgressSnapshot) {
        if !Self::throttled(&self.last_progress_write, self.log_throttle) {
            return;
        }
        let cache = Arc::clone(&self.cache);
        let key = self.progress_key();
        let value = match serde_json::to_value(&snapshot) {
            Ok(v) => v,
            Err(_) => return,
        };
        tokio::spawn(async move {
            let expires_at = Some(SystemTime::now() + PROGRESS_TTL);
            if let Err(e) = cache.set(&key, value, expires_at).await {
                tracing::warn!(error = %e, key = %key, "failed to write progress record");
            }
        });
    }
}

impl ProgressReporter for WorkerContext {
    fn log(&self, message: &str) {
        self.events.emit(Event::Log {
            session_id: self.session_id.clone(),
            message: message.to_string(),
        });
    }

    fn warn(&self, message: &str) {
        self.events.emit(Event::Warn {
            session_id: self.session_id.clone(),
            message: message.to_string(),
        });
    }

    fn log_throttled(&self, message: &str) {
        if Self::throttled(&self.last_log, self.log_throttle) {
            self.log(message);
        }
    }

    fn progress(&self, text: Option<&str>, current: Option<f64>, max: Option<f64>) {
        match (current, max) {
            (None, None) => {
                if let Some(text) = text {
                    self.log_throttled(text);
                }
                self.write_progress(ProgressSnapshot {
                    text: text.map(str::to_string),
                    current: None,
                });
            }
            (Some(cur), Some(max)) if max == 100.0 => {
                let percent = cur.clamp(0.0, 100.0).floor() as u8;
                let label = text.unwrap_or("Progress");
                self.log_throttled(&format!("{label}: {percent}%"));
                self.write_progress(ProgressSnapshot {
                    text: Some(label.to_string()),
                    current: Some(percent),
                });
            }
            (Some(cur), Some(max)) => {
                let percent = if max > 0.0 {
                    ((cur / max) * 100.0).ceil().clamp(0.0, 100.0) as u8
                } else {
                    0
                };
                let label = text.unwrap_or_default();
                self.log_throttled(&format!("{label}: {cur} / {max} ({percent}%)"));
                self.write_progress(ProgressSnapshot {
                    text: Some(label.to_string()),
                    current: Some(percent),
                });
            }
            (Some(cur), None) => {
                let label = text.unwrap_or_default();
                self.log_throttled(&format!("{label}: {cur}"));
                self.write_progress(ProgressSnapshot {
                    text: Some(label.to_string()),
                    current: None,
                });
            }
            (None, Some(_)) => {
                // Max without a current reading carries no information the
                // spec assigns a shape to; treat like a bare reset.
                if let Some(text) = text {
                    self.log_throttled(text);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "worker_context_tests.rs"]
mod tests;
