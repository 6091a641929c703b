// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin bridge between the clap-parsed CLI surface and the
//! `agentry-engine` façade. No orchestration logic lives here beyond
//! wiring an [`Orchestrator`] together and formatting its output.

use agentry_cache::MemoryCache;
use agentry_core::{SchedulerConfig, Worker};
use agentry_engine::examples::{ErrorsWorker, PrimesWorker, TimedWorker};
use agentry_engine::{GetOptions, Orchestrator, OrchestratorBuilder, RunOptions, SessionOverrides};
use agentry_loader::FileAgentSource;
use agentry_runner::InlineRunner;
use anyhow::Result;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

/// One CLI invocation's worth of caller input, already validated.
pub struct Request {
    pub id: String,
    pub settings: Value,
    pub runner: Option<String>,
    pub cache: Option<String>,
}

impl Request {
    fn overrides(&self) -> SessionOverrides {
        SessionOverrides {
            cache_key: None,
            runner: self.runner.clone(),
            cache: self.cache.clone(),
        }
    }
}

/// Builds an orchestrator over the bundled example agents
/// (`primes`, `timed`, `errors`) plus any agent definition files found
/// under `extra_paths`, registered against the same bundled workers.
pub async fn build_orchestrator(extra_paths: Vec<String>) -> Result<Arc<Orchestrator>> {
    let mut workers: IndexMap<String, Arc<dyn Worker>> = IndexMap::new();
    workers.insert("primes".to_string(), Arc::new(PrimesWorker));
    workers.insert("timed".to_string(), Arc::new(TimedWorker));
    workers.insert("errors".to_string(), Arc::new(ErrorsWorker));

    let mut config = SchedulerConfig::default();
    config.auto_install = true;
    config.allow_immediate = true;
    config.paths = extra_paths;

    let mut builder = OrchestratorBuilder::new(config.clone())
        .with_cache(Arc::new(MemoryCache::new("memory")))
        .with_runner(Arc::new(InlineRunner));

    if !config.paths.is_empty() {
        let source = FileAgentSource::new(config.paths.clone(), workers.clone());
        builder = builder.with_agent_source(Arc::new(source));
    }

    // The bundled agents are always available even with no `--path`
    // given, so `schedcache get primes` works out of the box.
    builder = builder
        .with_agent(bundled_agent("primes", Arc::clone(&workers["primes"]), None, true))
        .with_agent(bundled_agent(
            "timed",
            Arc::clone(&workers["timed"]),
            Some("*/5 * * * * *"),
            true,
        ))
        .with_agent(bundled_agent("errors", Arc::clone(&workers["errors"]), None, true));

    Ok(builder.build())
}

fn bundled_agent(
    id: &str,
    worker: Arc<dyn Worker>,
    timing: Option<&str>,
    has_return: bool,
) -> agentry_core::AgentDefinition {
    let mut methods = indexmap::IndexSet::new();
    methods.insert("inline".to_string());
    agentry_core::AgentDefinition {
        id: agentry_core::AgentId::new(id),
        worker,
        timing: timing.map(str::to_string),
        expires: None,
        has_return,
        immediate: false,
        methods,
        show: true,
        clear_on_build: false,
    }
}

pub async fn run_get(orchestrator: &Arc<Orchestrator>, request: Request) -> Result<()> {
    let overrides = request.overrides();
    let value = orchestrator
        .get(
            &request.id,
            request.settings,
            GetOptions {
                overrides,
                lazy: false,
            },
        )
        .await?;
    print_value(&value);
    Ok(())
}

pub async fn run_run(orchestrator: &Arc<Orchestrator>, request: Request, want_session: bool) -> Result<()> {
    let overrides = request.overrides();
    let outcome = orchestrator
        .run(
            &request.id,
            request.settings,
            RunOptions {
                overrides,
                want_session,
            },
        )
        .await?;
    match outcome {
        agentry_engine::RunOutcome::Value(value) => print_value(&value),
        agentry_engine::RunOutcome::Session(session) => {
            println!(
                "{}",
                serde_json::json!({
                    "sessionId": session.id.as_str(),
                    "cacheKey": session.cache_key,
                    "status": format!("{:?}", session.status).to_lowercase(),
                })
            );
        }
    }
    Ok(())
}

pub async fn run_invalidate(orchestrator: &Arc<Orchestrator>, request: Request) -> Result<()> {
    let overrides = request.overrides();
    orchestrator.invalidate(&request.id, request.settings, overrides).await?;
    Ok(())
}

pub async fn run_list(orchestrator: &Arc<Orchestrator>) -> Result<()> {
    let listing = orchestrator.list().await?;
    for agent in listing {
        println!(
            "{:<12} methods={:<16} timing={:<24} expires={:<8} cache_size={}",
            agent.id,
            agent.methods.join(","),
            agent.timing_human.unwrap_or_else(|| "-".to_string()),
            agent.expires.unwrap_or_else(|| "-".to_string()),
            agent
                .cache_size
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    Ok(())
}

fn print_value(value: &Option<Value>) {
    match value {
        Some(value) => println!("{value}"),
        None => println!("null"),
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
