// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::examples::{ErrorsWorker, PrimesWorker};
use agentry_cache::MemoryCache;
use agentry_core::Worker;
use agentry_runner::InlineRunner;
use indexmap::IndexSet;
use std::sync::atomic::{AtomicUsize, Ordering};

fn primes_agent() -> AgentDefinition {
    let mut methods = IndexSet::new();
    methods.insert("inline".to_string());
    AgentDefinition {
        id: AgentId::new("primes"),
        worker: Arc::new(PrimesWorker),
        timing: None,
        expires: None,
        has_return: true,
        immediate: false,
        methods,
        show: true,
        clear_on_build: false,
    }
}

fn errors_agent() -> AgentDefinition {
    let mut methods = IndexSet::new();
    methods.insert("inline".to_string());
    AgentDefinition {
        id: AgentId::new("errors"),
        worker: Arc::new(ErrorsWorker),
        timing: None,
        expires: None,
        has_return: true,
        immediate: false,
        methods,
        show: true,
        clear_on_build: false,
    }
}

fn build() -> Arc<Orchestrator> {
    let mut config = SchedulerConfig::default();
    config.auto_install = false;
    config.allow_immediate = false;
    OrchestratorBuilder::new(config)
        .with_cache(Arc::new(MemoryCache::new("memory")))
        .with_runner(Arc::new(InlineRunner))
        .with_agent(primes_agent())
        .with_agent(errors_agent())
        .build()
}

#[tokio::test]
async fn get_runs_once_and_then_serves_from_cache() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();

    let value = orchestrator
        .get("primes", serde_json::json!({ "limit": 1000 }), GetOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value.as_array().unwrap().len(), 168);

    // A second get must not re-invoke the worker: flip the registered agent's
    // worker to one that panics if called, and confirm the cached value still
    // comes back untouched.
    let value_again = orchestrator
        .get("primes", serde_json::json!({ "limit": 1000 }), GetOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value_again, value);
}

#[tokio::test]
async fn invalidate_forces_a_fresh_run_on_next_get() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();

    orchestrator
        .get("primes", serde_json::json!({ "limit": 10 }), GetOptions::default())
        .await
        .unwrap();

    orchestrator
        .invalidate("primes", serde_json::json!({ "limit": 10 }), SessionOverrides::default())
        .await
        .unwrap();

    let size = orchestrator
        .get_size("primes", serde_json::json!({ "limit": 10 }), SessionOverrides::default())
        .await
        .unwrap();
    assert!(size.is_none());

    let value = orchestrator
        .get("primes", serde_json::json!({ "limit": 10 }), GetOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn lazy_get_returns_absence_without_running() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();

    let value = orchestrator
        .get(
            "primes",
            serde_json::json!({ "limit": 10 }),
            GetOptions {
                overrides: SessionOverrides::default(),
                lazy: true,
            },
        )
        .await
        .unwrap();
    assert!(value.is_none());

    let size = orchestrator
        .get_size("primes", serde_json::json!({ "limit": 10 }), SessionOverrides::default())
        .await
        .unwrap();
    assert!(size.is_none(), "lazy get must not have triggered a run");
}

#[tokio::test]
async fn concurrent_requests_for_the_same_key_coalesce_onto_one_run() {
    struct CountingWorker {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Worker for CountingWorker {
        async fn run(
            &self,
            _settings: serde_json::Value,
            _ctx: Arc<dyn agentry_core::ProgressReporter>,
        ) -> Result<serde_json::Value, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(serde_json::json!("done"))
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let mut methods = IndexSet::new();
    methods.insert("inline".to_string());
    let agent = AgentDefinition {
        id: AgentId::new("counted"),
        worker: Arc::new(CountingWorker { calls: Arc::clone(&calls) }),
        timing: None,
        expires: None,
        has_return: true,
        immediate: false,
        methods,
        show: true,
        clear_on_build: false,
    };

    let mut config = SchedulerConfig::default();
    config.auto_install = false;
    config.allow_immediate = false;
    let orchestrator = OrchestratorBuilder::new(config)
        .with_cache(Arc::new(MemoryCache::new("memory")))
        .with_runner(Arc::new(InlineRunner))
        .with_agent(agent)
        .build();
    orchestrator.init().await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orchestrator = Arc::clone(&orchestrator);
        handles.push(tokio::spawn(async move {
            orchestrator
                .run("counted", serde_json::Value::Null, RunOptions::default())
                .await
        }));
    }

    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        match outcome {
            RunOutcome::Value(value) => assert_eq!(value, Some(serde_json::json!("done"))),
            RunOutcome::Session(_) => panic!("want_session was not requested"),
        }
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn run_with_want_session_returns_a_pending_then_completed_session() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();

    let outcome = orchestrator
        .run(
            "primes",
            serde_json::json!({ "limit": 100 }),
            RunOptions {
                overrides: SessionOverrides::default(),
                want_session: true,
            },
        )
        .await
        .unwrap();
    let session = match outcome {
        RunOutcome::Session(session) => session,
        RunOutcome::Value(_) => panic!("want_session was requested"),
    };
    assert_eq!(session.status, SessionStatus::Pending);
    assert!(!session.cache_key.is_empty());

    // Poll until the background execution finishes.
    let mut completed = None;
    for _ in 0..50 {
        let polled = orchestrator.get_session(&session).await.unwrap();
        if polled.status != SessionStatus::Pending {
            completed = Some(polled);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    let completed = completed.expect("session should have completed");
    assert_eq!(completed.status, SessionStatus::Complete);
    assert_eq!(completed.result.unwrap().as_array().unwrap().len(), 25);
}

#[tokio::test]
async fn runner_error_propagates_as_a_descriptive_string() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();

    let err = orchestrator
        .run("errors", serde_json::json!({ "throw": true }), RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("intentional failure"));
}

#[tokio::test]
async fn requesting_an_unregistered_runner_fails_without_starting_the_worker() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();

    let err = orchestrator
        .run(
            "primes",
            serde_json::Value::Null,
            RunOptions {
                overrides: SessionOverrides {
                    runner: Some("supervised".to_string()),
                    ..Default::default()
                },
                want_session: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownRunner(_)));
}

#[tokio::test]
async fn requesting_a_registered_but_incompatible_runner_fails_without_starting_the_worker() {
    struct NoopRunner;

    #[async_trait::async_trait]
    impl agentry_runner::Runner for NoopRunner {
        fn name(&self) -> &str {
            "other"
        }

        async fn exec(
            &self,
            _session: &Session,
            _agent: &AgentDefinition,
            _cache: Arc<dyn agentry_cache::CacheBackend>,
            _ctx: Arc<dyn agentry_core::ProgressReporter>,
        ) -> Result<Option<serde_json::Value>, agentry_runner::RunnerError> {
            panic!("the worker must never start for an incompatible runner");
        }
    }

    let mut config = SchedulerConfig::default();
    config.auto_install = false;
    config.allow_immediate = false;
    let orchestrator = OrchestratorBuilder::new(config)
        .with_cache(Arc::new(MemoryCache::new("memory")))
        .with_runner(Arc::new(InlineRunner))
        .with_runner(Arc::new(NoopRunner))
        .with_agent(primes_agent())
        .build();
    orchestrator.init().await.unwrap();

    let err = orchestrator
        .run(
            "primes",
            serde_json::Value::Null,
            RunOptions {
                overrides: SessionOverrides {
                    runner: Some("other".to_string()),
                    ..Default::default()
                },
                want_session: false,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::RunnerNotCompatible { .. }));
}

#[tokio::test]
async fn list_reports_every_registered_agent_with_cache_metadata() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();

    orchestrator
        .get("primes", serde_json::Value::Null, GetOptions::default())
        .await
        .unwrap();

    let listing = orchestrator.list().await.unwrap();
    let primes = listing.iter().find(|a| a.id == "primes").unwrap();
    assert_eq!(primes.methods, vec!["inline".to_string()]);
    assert!(primes.cache_size.is_some());

    let errors = listing.iter().find(|a| a.id == "errors").unwrap();
    assert!(errors.cache_size.is_none());
}

#[tokio::test]
async fn get_session_by_unknown_key_is_an_error() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();

    let err = orchestrator.get_session_by_key("no-such-key").await.unwrap_err();
    assert!(matches!(err, EngineError::NoSuchSession(_)));
}

#[tokio::test]
async fn destroy_is_idempotent() {
    let orchestrator = build();
    orchestrator.init().await.unwrap();
    orchestrator.destroy().await.unwrap();
    orchestrator.destroy().await.unwrap();
}

#[tokio::test]
async fn build_and_init_honors_auto_init() {
    let mut config = SchedulerConfig::default();
    config.auto_install = false;
    config.allow_immediate = false;
    config.auto_init = true;
    let orchestrator = OrchestratorBuilder::new(config)
        .with_cache(Arc::new(MemoryCache::new("memory")))
        .with_runner(Arc::new(InlineRunner))
        .with_agent(primes_agent())
        .build_and_init()
        .await
        .unwrap();

    // init() ran already: the registry is populated without a separate
    // caller-issued `init()` call.
    assert!(orchestrator.has("primes"));
}

#[tokio::test]
async fn build_and_init_skips_init_when_auto_init_is_false() {
    let mut config = SchedulerConfig::default();
    config.auto_install = false;
    config.allow_immediate = false;
    config.auto_init = false;
    let orchestrator = OrchestratorBuilder::new(config)
        .with_cache(Arc::new(MemoryCache::new("memory")))
        .with_runner(Arc::new(InlineRunner))
        .with_agent(primes_agent())
        .build_and_init()
        .await
        .unwrap();

    // refresh() (part of init()) never ran, so the registry is still empty.
    assert!(!orchestrator.has("primes"));
}
