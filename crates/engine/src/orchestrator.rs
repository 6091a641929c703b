// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestrator façade (spec §4.1): `init`, `destroy`, `refresh`,
//! `has`, `get`, `get_size`, `run`, `invalidate`, `get_session`, `list`.
//!
//! Built once via [`OrchestratorBuilder`] and always held behind an
//! `Arc` — `run` and the cron/immediate launchers spawn detached tasks
//! that need their own handle back onto the orchestrator.

use crate::coalescer::{Coalescer, Join, SessionOutcome};
use crate::cron::{parse_schedule, CronScheduler};
use crate::error::EngineError;
use crate::events::{Event, EventBus};
use crate::registry::{AgentRegistry, AgentSource, DiscoveredAgent};
use crate::session_factory::{SessionFactory, SessionOverrides};
use crate::worker_context::WorkerContext;
use agentry_cache::CacheBackend;
use agentry_core::{derive_cache_key, AgentDefinition, AgentId, ProgressReporter, SchedulerConfig, Session, SessionStatus};
use agentry_runner::Runner;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::{broadcast, mpsc};

/// Caller hook overriding default runner selection. Consulted before the
/// built-in `methods`-first-match fallback; returning `None` defers to it.
pub type RunnerSelectHook = Box<dyn Fn(&AgentDefinition, &Value) -> Option<String> + Send + Sync>;

/// Caller hook overriding default cache selection (the first registered
/// backend, by default).
pub type CacheSelectHook = Box<dyn Fn(&AgentDefinition, &Value) -> Option<String> + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub overrides: SessionOverrides,
    /// Return absence instead of triggering a run on a cache miss.
    pub lazy: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub overrides: SessionOverrides,
    /// Return the (possibly still-pending) session record instead of
    /// awaiting the eventual value.
    pub want_session: bool,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    Value(Option<Value>),
    Session(Session),
}

/// One row of [`Orchestrator::list`]'s output.
#[derive(Debug, Clone)]
pub struct AgentListing {
    pub id: String,
    pub cache_key: String,
    pub timing: Option<String>,
    pub timing_human: Option<String>,
    pub expires: Option<String>,
    pub methods: Vec<String>,
    pub cache_size: Option<u64>,
    pub cache_created_at: Option<SystemTime>,
}

pub struct Orchestrator {
    config: SchedulerConfig,
    registry: RwLock<AgentRegistry>,
    caches: IndexMap<String, Arc<dyn CacheBackend>>,
    runners: IndexMap<String, Arc<dyn Runner>>,
    static_agents: Vec<AgentDefinition>,
    agent_source: Option<Arc<dyn AgentSource>>,
    runner_select_hook: Option<RunnerSelectHook>,
    cache_select_hook: Option<CacheSelectHook>,
    coalescer: Coalescer,
    events: EventBus,
    cron: Mutex<CronScheduler>,
    /// Last-known session per cache key. The spec's `getSession(cacheKey)`
    /// assumes a dynamically-typed runtime can synthesize a session-shaped
    /// object purely from a cache read; `agentry_core::Session` carries a
    /// typed `agent_id`/`runner`/`cache` it cannot fabricate, so this map
    /// is the authoritative record for any cache key this orchestrator
    /// itself dispatched. A cache key never seen by this process still
    /// falls back to scanning the registered backends (see
    /// `get_session_by_key`).
    session_log: DashMap<String, Session>,
}

pub struct OrchestratorBuilder {
    config: SchedulerConfig,
    caches: IndexMap<String, Arc<dyn CacheBackend>>,
    runners: IndexMap<String, Arc<dyn Runner>>,
    static_agents: Vec<AgentDefinition>,
    agent_source: Option<Arc<dyn AgentSource>>,
    runner_select_hook: Option<RunnerSelectHook>,
    cache_select_hook: Option<CacheSelectHook>,
}

impl OrchestratorBuilder {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            caches: IndexMap::new(),
            runners: IndexMap::new(),
            static_agents: Vec::new(),
            agent_source: None,
            runner_select_hook: None,
            cache_select_hook: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheBackend>) -> Self {
        self.caches.insert(cache.name().to_string(), cache);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runners.insert(runner.name().to_string(), runner);
        self
    }

    /// Register an agent directly, bypassing any [`AgentSource`]. Useful
    /// for embedding callers and for tests.
    pub fn with_agent(mut self, agent: AgentDefinition) -> Self {
        self.static_agents.push(agent);
        self
    }

    pub fn with_agent_source(mut self, source: Arc<dyn AgentSource>) -> Self {
        self.agent_source = Some(source);
        self
    }

    pub fn with_runner_select(
        mut self,
        hook: impl Fn(&AgentDefinition, &Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.runner_select_hook = Some(Box::new(hook));
        self
    }

    pub fn with_cache_select(
        mut self,
        hook: impl Fn(&AgentDefinition, &Value) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.cache_select_hook = Some(Box::new(hook));
        self
    }

    pub fn build(self) -> Arc<Orchestrator> {
        Arc::new(Orchestrator {
            config: self.config,
            registry: RwLock::new(AgentRegistry::new()),
            caches: self.caches,
            runners: self.runners,
            static_agents: self.static_agents,
            agent_source: self.agent_source,
            runner_select_hook: self.runner_select_hook,
            cache_select_hook: self.cache_select_hook,
            coalescer: Coalescer::new(),
            events: EventBus::new(),
            cron: Mutex::new(CronScheduler::new()),
            session_log: DashMap::new(),
        })
    }

    /// Builds the orchestrator and, if `config.auto_init` is set, runs
    /// `init()` immediately (spec §6: `autoInit` — "run init from the
    /// constructor"). `build()` stays synchronous and never initializes on
    /// its own, since cache-backend/cron/immediate-agent startup is
    /// inherently async; this is the async entry point that honors the
    /// flag.
    pub async fn build_and_init(self) -> Result<Arc<Orchestrator>, EngineError> {
        let auto_init = self.config.auto_init;
        let orchestrator = self.build();
        if auto_init {
            orchestrator.init().await?;
        }
        Ok(orchestrator)
    }
}

impl Orchestrator {
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn has(&self, id: &str) -> bool {
        self.registry.read().has(id)
    }

    /// Constructs cache backends, refreshes the registry, installs cron
    /// tasks, and launches `immediate` agents (spec §4.1).
    pub async fn init(self: &Arc<Self>) -> Result<(), EngineError> {
        self.events.emit(Event::Init);
        for cache in self.caches.values() {
            cache.init().await?;
        }
        self.refresh().await?;
        if self.config.auto_install {
            self.install_cron_tasks()?;
        }
        if self.config.allow_immediate {
            self.launch_immediate_agents();
        }
        self.events.emit(Event::Ready);
        Ok(())
    }

    /// Stops the scheduler, destroys cache backends, and releases runner
    /// resources. Idempotent.
    pub async fn destroy(&self) -> Result<(), EngineError> {
        self.events.emit(Event::Destroy);
        self.cron.lock().stop();
        for cache in self.caches.values() {
            cache.destroy().await?;
        }
        for runner in self.runners.values() {
            runner.destroy().await?;
        }
        self.events.emit(Event::Destroyed);
        Ok(())
    }

    /// Re-enumerates agent definitions (via the configured [`AgentSource`]
    /// plus any statically registered agents) and rebuilds the registry.
    pub async fn refresh(&self) -> Result<Vec<String>, EngineError> {
        let mut discovered = match &self.agent_source {
            Some(source) => source.discover().await.map_err(EngineError::Run)?,
            None => Vec::new(),
        };
        for agent in &self.static_agents {
            discovered.push(DiscoveredAgent {
                definition: agent.clone(),
                source_path: "<static>".to_string(),
            });
        }

        let (registry, warnings) = AgentRegistry::rebuild(discovered);
        let ids = registry.ids();
        *self.registry.write() = registry;

        for warning in warnings {
            self.events.emit(Event::RefreshWarn {
                path: warning.path,
                message: warning.message,
            });
        }
        self.events.emit(Event::Refresh(ids.clone()));
        Ok(ids)
    }

    /// Returns the cached value if present; otherwise runs the agent and
    /// returns its eventual value. `opts.lazy` returns absence on a miss
    /// instead of triggering a run.
    pub async fn get(
        self: &Arc<Self>,
        id: &str,
        settings: Value,
        opts: GetOptions,
    ) -> Result<Option<Value>, EngineError> {
        let (session, agent) = self.create_session(id, settings, opts.overrides)?;
        if let Some(cache) = self.caches.get(&session.cache) {
            if let Some(value) = cache.get(&session.cache_key).await? {
                return Ok(Some(value));
            }
        }
        if opts.lazy {
            return Ok(None);
        }
        match self.dispatch(session, agent, false).await? {
            RunOutcome::Value(value) => Ok(value),
            RunOutcome::Session(_) => unreachable!("dispatch(want_session=false) always returns Value"),
        }
    }

    /// Probes the cache's byte size for the derived key without
    /// triggering a run.
    pub async fn get_size(
        &self,
        id: &str,
        settings: Value,
        overrides: SessionOverrides,
    ) -> Result<Option<u64>, EngineError> {
        let (session, _agent) = self.create_session(id, settings, overrides)?;
        let cache = self
            .caches
            .get(&session.cache)
            .ok_or_else(|| EngineError::UnknownCache(session.cache.clone()))?;
        Ok(cache.size(&session.cache_key).await?)
    }

    /// Forces execution. Returns the eventual value, or (with
    /// `opts.want_session`) the session record immediately.
    pub async fn run(
        self: &Arc<Self>,
        id: &str,
        settings: Value,
        opts: RunOptions,
    ) -> Result<RunOutcome, EngineError> {
        let (session, agent) = self.create_session(id, settings, opts.overrides)?;
        self.dispatch(session, agent, opts.want_session).await
    }

    /// Removes the cached value for `(id, settings)`. Does not cancel an
    /// in-flight run on the same key.
    pub async fn invalidate(
        &self,
        id: &str,
        settings: Value,
        overrides: SessionOverrides,
    ) -> Result<(), EngineError> {
        let (session, _agent) = self.create_session(id, settings, overrides)?;
        let cache = self
            .caches
            .get(&session.cache)
            .ok_or_else(|| EngineError::UnknownCache(session.cache.clone()))?;
        cache.unset(&session.cache_key).await?;
        Ok(())
    }

    /// Looks up the session previously created for `cache_key`, falling
    /// back to a best-effort reconstruction from the cache if this
    /// orchestrator never saw the key (spec §4.1 `getSession`).
    pub async fn get_session_by_key(&self, cache_key: &str) -> Result<Session, EngineError> {
        if let Some(session) = self.session_log.get(cache_key) {
            return Ok(session.clone());
        }

        match self.scan_caches_for_key(cache_key).await? {
            Some(value) => {
                let mut session = Session::new(
                    AgentId::new(cache_key.to_string()),
                    Value::Null,
                    cache_key.to_string(),
                    "unknown".to_string(),
                    "unknown".to_string(),
                );
                session.status = classify_cache_value(&value);
                if session.status == SessionStatus::Error {
                    session.error = value
                        .get("error")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .or_else(|| Some("error".to_string()));
                } else {
                    session.result = Some(value);
                }
                Ok(session)
            }
            None => Err(EngineError::NoSuchSession(cache_key.to_string())),
        }
    }

    pub async fn get_session(&self, session: &Session) -> Result<Session, EngineError> {
        self.get_session_by_key(&session.cache_key).await
    }

    /// One record per registered agent: id, default cache key, timing,
    /// expiry, methods, and cache-resident metadata if present.
    pub async fn list(&self) -> Result<Vec<AgentListing>, EngineError> {
        let snapshot: Vec<AgentDefinition> = {
            let registry = self.registry.read();
            registry.iter().cloned().collect()
        };

        let mut out = Vec::with_capacity(snapshot.len());
        for agent in &snapshot {
            let cache_key = derive_cache_key(&agent.id, &Value::Null, self.config.key_rewrite.as_deref());
            let cache_name = self.resolve_cache(agent, &Value::Null);

            let mut cache_size = None;
            let mut cache_created_at = None;
            if let Some(name) = &cache_name {
                if let Some(cache) = self.caches.get(name) {
                    if let Some(meta) = cache.list().await?.into_iter().find(|m| m.id == cache_key) {
                        cache_size = Some(meta.size);
                        cache_created_at = Some(meta.created_at);
                    }
                }
            }

            out.push(AgentListing {
                id: agent.id.to_string(),
                cache_key,
                timing_human: humanize_timing(agent.timing.as_deref()),
                timing: agent.timing.clone(),
                expires: agent.expires.clone(),
                methods: agent.methods.iter().cloned().collect(),
                cache_size,
                cache_created_at,
            });
        }
        Ok(out)
    }

    fn create_session(
        &self,
        id: &str,
        settings: Value,
        overrides: SessionOverrides,
    ) -> Result<(Session, Arc<AgentDefinition>), EngineError> {
        let registry = self.registry.read();
        let runner_select = |agent: &AgentDefinition, settings: &Value| self.resolve_runner(agent, settings);
        let cache_select = |agent: &AgentDefinition, settings: &Value| self.resolve_cache(agent, settings);
        let factory = SessionFactory {
            registry: &registry,
            caches: &self.caches,
            runners: &self.runners,
            cache_select: &cache_select,
            runner_select: &runner_select,
            key_rewrite: self.config.key_rewrite.as_deref(),
        };
        factory.create(id, settings, overrides)
    }

    fn resolve_runner(&self, agent: &AgentDefinition, settings: &Value) -> Option<String> {
        if let Some(hook) = &self.runner_select_hook {
            if let Some(name) = hook(agent, settings) {
                return Some(name);
            }
        }
        if !agent.methods.is_empty() {
            agent
                .first_enabled_method(|r| self.runners.contains_key(r))
                .map(str::to_string)
        } else if self.runners.len() == 1 {
            self.runners.keys().next().cloned()
        } else {
            None
        }
    }

    fn resolve_cache(&self, agent: &AgentDefinition, settings: &Value) -> Option<String> {
        if let Some(hook) = &self.cache_select_hook {
            if let Some(name) = hook(agent, settings) {
                return Some(name);
            }
        }
        let _ = (agent, settings);
        self.caches.keys().next().cloned()
    }

    /// Joins the coalescer for `session.cache_key`: a fresh leader spawns
    /// the actual execution detached and subscribes before doing so (so
    /// the single broadcast send can never race ahead of every receiver);
    /// a follower just waits on the leader's outcome.
    async fn dispatch(
        self: &Arc<Self>,
        session: Session,
        agent: Arc<AgentDefinition>,
        want_session: bool,
    ) -> Result<RunOutcome, EngineError> {
        let cache_key = session.cache_key.clone();
        match self.coalescer.join(&cache_key) {
            Join::Leader(tx) => {
                let rx = tx.subscribe();
                self.session_log.insert(cache_key.clone(), session.clone());
                let session_for_caller = session.clone();
                let this = Arc::clone(self);
                let key_for_task = cache_key.clone();
                tokio::spawn(async move {
                    let result = this.execute(&session, &agent).await;
                    this.record_session_outcome(&key_for_task, &result);
                    let outcome: SessionOutcome = match &result {
                        Ok(value) => Ok(value.clone()),
                        Err(e) => Err(e.short()),
                    };
                    this.coalescer.finish(&key_for_task, outcome);
                });
                if want_session {
                    Ok(RunOutcome::Session(session_for_caller))
                } else {
                    Self::await_outcome(rx).await
                }
            }
            Join::Follower(rx) => {
                if want_session {
                    Ok(RunOutcome::Session(session))
                } else {
                    Self::await_outcome(rx).await
                }
            }
        }
    }

    async fn await_outcome(mut rx: broadcast::Receiver<SessionOutcome>) -> Result<RunOutcome, EngineError> {
        match rx.recv().await {
            Ok(Ok(value)) => Ok(RunOutcome::Value(value)),
            Ok(Err(message)) => Err(EngineError::Run(message)),
            Err(_) => Err(EngineError::Run(
                "execution ended without producing a result".to_string(),
            )),
        }
    }

    fn record_session_outcome(&self, cache_key: &str, result: &Result<Option<Value>, EngineError>) {
        if let Some(mut entry) = self.session_log.get_mut(cache_key) {
            match result {
                Ok(value) => {
                    entry.status = SessionStatus::Complete;
                    entry.result = value.clone();
                    entry.error = None;
                }
                Err(e) => entry.mark_error(e.short()),
            }
        }
    }

    async fn execute(
        &self,
        session: &Session,
        agent: &AgentDefinition,
    ) -> Result<Option<Value>, EngineError> {
        let cache = self
            .caches
            .get(&session.cache)
            .cloned()
            .ok_or_else(|| EngineError::UnknownCache(session.cache.clone()))?;
        let runner = self
            .runners
            .get(&session.runner)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRunner(session.runner.clone()))?;

        let progress_key = format!("{}-progress", session.cache_key);
        if let Err(e) = cache.unset(&progress_key).await {
            tracing::warn!(error = %e, key = %progress_key, "failed to clear stale progress record");
        }

        let ctx: Arc<dyn ProgressReporter> = Arc::new(WorkerContext::new(
            session.id.clone(),
            session.cache_key.clone(),
            Arc::clone(&cache),
            self.events.clone(),
            self.config.log_throttle,
        ));
        self.events.emit(Event::Run {
            session_id: session.id.clone(),
            agent_id: session.agent_id.to_string(),
            cache_key: session.cache_key.clone(),
        });

        runner.exec(session, agent, cache, ctx).await.map_err(EngineError::from)
    }

    /// Fans out a `get` across every registered backend in parallel and
    /// returns the first one reporting data, matching spec §4.1's
    /// `getSession(cacheKey)` fallback.
    async fn scan_caches_for_key(&self, cache_key: &str) -> Result<Option<Value>, EngineError> {
        if self.caches.is_empty() {
            return Ok(None);
        }
        let (tx, mut rx) = mpsc::channel(self.caches.len());
        for cache in self.caches.values().cloned() {
            let tx = tx.clone();
            let key = cache_key.to_string();
            tokio::spawn(async move {
                let result = cache.get(&key).await;
                let _ = tx.send(result).await;
            });
        }
        drop(tx);
        while let Some(result) = rx.recv().await {
            match result {
                Ok(Some(value)) => return Ok(Some(value)),
                Ok(None) => continue,
                Err(e) => return Err(EngineError::from(e)),
            }
        }
        Ok(None)
    }

    fn install_cron_tasks(self: &Arc<Self>) -> Result<(), EngineError> {
        let timed: Vec<(String, String)> = {
            let registry = self.registry.read();
            registry
                .iter()
                .filter_map(|a| a.timing.clone().map(|t| (a.id.to_string(), t)))
                .collect()
        };

        let mut scheduler = self.cron.lock();
        for (agent_id, expr) in timed {
            let schedule = parse_schedule(&expr)
                .map_err(|e| EngineError::InvalidCron(expr.clone(), e.to_string()))?;
            self.events.emit(Event::Scheduled(agent_id.clone()));
            let this = Arc::clone(self);
            scheduler.install(agent_id, schedule, move |id| {
                let this = Arc::clone(&this);
                async move {
                    this.events.emit(Event::Tick(id.clone()));
                    if let Err(e) = this.run(&id, Value::Null, RunOptions::default()).await {
                        tracing::warn!(agent = %id, error = %e, "scheduled run failed");
                    }
                }
            });
        }
        Ok(())
    }

    fn launch_immediate_agents(self: &Arc<Self>) {
        let immediate_ids: Vec<String> = {
            let registry = self.registry.read();
            registry
                .iter()
                .filter(|a| a.immediate)
                .map(|a| a.id.to_string())
                .collect()
        };
        for id in immediate_ids {
            self.events.emit(Event::RunImmediate(id.clone()));
            let this = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = this.run(&id, Value::Null, RunOptions::default()).await {
                    tracing::warn!(agent = %id, error = %e, "immediate run failed");
                }
            });
        }
    }
}

/// getSession's cache-shape inference (spec §4.6), with the source's
/// documented defect corrected per the spec's own design note: any
/// present, non-error value is `complete`, regardless of shape.
fn classify_cache_value(value: &Value) -> SessionStatus {
    if let Value::Object(map) = value {
        if map.len() == 1 && map.contains_key("error") {
            return SessionStatus::Error;
        }
    }
    SessionStatus::Complete
}

fn humanize_timing(expr: Option<&str>) -> Option<String> {
    let expr = expr?;
    let fields: Vec<&str> = expr.split_whitespace().collect();
    if let Some(first) = fields.first() {
        if let Some(n) = first.strip_prefix("*/") {
            if fields.len() >= 2 && fields[1] == "*" {
                return Some(format!("every {n} seconds"));
            }
        }
    }
    Some(expr.to_string())
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
