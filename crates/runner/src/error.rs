// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner error kinds (spec §7, "Runner error").

use agentry_cache::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    /// The worker body returned or threw an error; `exec` never retries.
    #[error("{0}")]
    Worker(String),

    #[error("process exited with code {code}: see {log_path}")]
    NonZeroExit { code: i32, log_path: String },

    #[error("supervisor error: {0}")]
    Supervisor(String),

    #[error("{0}")]
    PostMortem(String),

    #[error("process reported unknown status: {0}")]
    UnknownStatus(String),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("invalid expiry: {0}")]
    InvalidExpiry(String),
}
