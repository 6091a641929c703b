// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use agentry_cache::MemoryCache;
use agentry_core::{AgentId, Methods, Worker};
use async_trait::async_trait;
use serde_json::json;

struct NoopProgress;
impl ProgressReporter for NoopProgress {
    fn log(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn log_throttled(&self, _message: &str) {}
    fn progress(&self, _text: Option<&str>, _current: Option<f64>, _max: Option<f64>) {}
}

struct EchoWorker;
#[async_trait]
impl Worker for EchoWorker {
    async fn run(
        &self,
        settings: Value,
        _ctx: Arc<dyn ProgressReporter>,
    ) -> Result<Value, String> {
        Ok(settings)
    }
}

struct FailingWorker;
#[async_trait]
impl Worker for FailingWorker {
    async fn run(&self, _settings: Value, _ctx: Arc<dyn ProgressReporter>) -> Result<Value, String> {
        Err("boom".to_string())
    }
}

fn def(worker: Arc<dyn Worker>, has_return: bool) -> AgentDefinition {
    AgentDefinition {
        id: AgentId::new("echo"),
        worker,
        timing: None,
        expires: None,
        has_return,
        immediate: false,
        methods: Methods::new(),
        show: true,
        clear_on_build: false,
    }
}

fn session(cache_key: &str) -> Session {
    Session::new(
        AgentId::new("echo"),
        json!({"value": 1}),
        cache_key.to_string(),
        "inline".to_string(),
        "memory".to_string(),
    )
}

#[tokio::test]
async fn success_with_has_return_writes_the_cache() {
    let runner = InlineRunner;
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let agent = def(Arc::new(EchoWorker), true);
    let session = session("echo-1");

    let result = runner
        .exec(&session, &agent, cache.clone(), Arc::new(NoopProgress))
        .await
        .unwrap();

    assert_eq!(result, Some(json!({"value": 1})));
    assert_eq!(cache.get("echo-1").await.unwrap(), Some(json!({"value": 1})));
}

#[tokio::test]
async fn success_with_has_return_false_does_not_write_the_cache() {
    let runner = InlineRunner;
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let agent = def(Arc::new(EchoWorker), false);
    let session = session("echo-2");

    let result = runner
        .exec(&session, &agent, cache.clone(), Arc::new(NoopProgress))
        .await
        .unwrap();

    assert_eq!(result, None);
    assert_eq!(cache.get("echo-2").await.unwrap(), None);
}

#[tokio::test]
async fn failure_does_not_write_the_cache_and_returns_worker_error() {
    let runner = InlineRunner;
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let agent = def(Arc::new(FailingWorker), true);
    let session = session("echo-3");

    let err = runner
        .exec(&session, &agent, cache.clone(), Arc::new(NoopProgress))
        .await
        .unwrap_err();

    assert!(matches!(err, RunnerError::Worker(ref msg) if msg == "boom"));
    assert_eq!(cache.get("echo-3").await.unwrap(), None);
}

#[tokio::test]
async fn expires_sets_a_ttl_on_the_cache_write() {
    let runner = InlineRunner;
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let mut agent = def(Arc::new(EchoWorker), true);
    agent.expires = Some("10ms".to_string());
    let session = session("echo-4");

    runner
        .exec(&session, &agent, cache.clone(), Arc::new(NoopProgress))
        .await
        .unwrap();

    assert_eq!(cache.get("echo-4").await.unwrap(), Some(json!({"value": 1})));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(cache.get("echo-4").await.unwrap(), None);
}
