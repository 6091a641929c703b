// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Definition-time and key-derivation errors shared across the workspace.

use thiserror::Error;

/// Errors raised while validating an [`crate::agent::AgentDefinition`] or
/// deriving a cache key from one.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("agent definition missing required field: {0}")]
    MissingField(&'static str),

    #[error("agent '{0}' declares a timing but no methods")]
    TimedAgentWithoutMethods(String),

    #[error("invalid expiry duration '{value}': {reason}")]
    InvalidExpiry { value: String, reason: String },

    #[error("failed to serialize agent settings: {0}")]
    SettingsSerialization(String),
}
