// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! agentry-engine: the orchestration kernel — session construction,
//! cache-key derivation, in-flight coalescing, runner dispatch, and the
//! cron scheduler, composed behind a single [`orchestrator::Orchestrator`]
//! façade.
//!
//! Agent discovery (`AgentSource`) and the worker bodies themselves are
//! external collaborators; `agentry-loader` provides a filesystem-backed
//! `AgentSource` and the `test-support` feature ships a handful of example
//! worker bodies used by this crate's own tests and the workspace
//! integration suite.

pub mod coalescer;
pub mod cron;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod registry;
pub mod session_factory;
pub mod worker_context;

#[cfg(any(test, feature = "test-support"))]
pub mod examples;

pub use coalescer::{Coalescer, Join, SessionOutcome};
pub use cron::{parse_schedule, CronError, CronScheduler};
pub use error::EngineError;
pub use events::{Event, EventBus};
pub use orchestrator::{
    AgentListing, CacheSelectHook, GetOptions, Orchestrator, OrchestratorBuilder, RunOptions,
    RunOutcome, RunnerSelectHook,
};
pub use registry::{AgentRegistry, AgentSource, DiscoveredAgent, RefreshWarning};
pub use session_factory::{SessionFactory, SessionOverrides};
pub use worker_context::WorkerContext;
