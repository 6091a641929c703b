// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::events::Event;
use agentry_cache::MemoryCache;
use agentry_core::SessionId;
use std::time::Duration;

fn ctx(cache: Arc<dyn CacheBackend>, events: EventBus) -> WorkerContext {
    WorkerContext::new(
        SessionId::new("s1"),
        "primes".to_string(),
        cache,
        events,
        Duration::from_millis(50),
    )
}

#[tokio::test]
async fn log_emits_tagged_event() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let context = ctx(cache, events);

    context.log("hello");

    match rx.recv().await.unwrap() {
        Event::Log { session_id, message } => {
            assert_eq!(session_id.as_str(), "s1");
            assert_eq!(message, "hello");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn log_throttled_drops_bursts_within_the_window() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let context = ctx(cache, events);

    context.log_throttled("first");
    context.log_throttled("second");
    tokio::time::sleep(Duration::from_millis(60)).await;
    context.log_throttled("third");

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::Log { message, .. } = event {
            received.push(message);
        }
    }
    assert_eq!(received, vec!["first".to_string(), "third".to_string()]);
}

#[tokio::test]
async fn progress_max_100_renders_percent() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let context = ctx(cache, events);

    context.progress(Some("Scanning"), Some(42.0), Some(100.0));

    match rx.recv().await.unwrap() {
        Event::Log { message, .. } => assert_eq!(message, "Scanning: 42%"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn progress_current_over_max_renders_fraction_and_ceiling_percent() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let context = ctx(cache, events);

    context.progress(Some("Pages"), Some(1.0), Some(3.0));

    match rx.recv().await.unwrap() {
        Event::Log { message, .. } => assert_eq!(message, "Pages: 1 / 3 (34%)"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn progress_current_only_has_no_percent() {
    let events = EventBus::new();
    let mut rx = events.subscribe();
    let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
    let context = ctx(cache, events);

    context.progress(Some("Rows"), Some(7.0), None);

    match rx.recv().await.unwrap() {
        Event::Log { message, .. } => assert_eq!(message, "Rows: 7"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn progress_writes_throttled_cache_record() {
    let events = EventBus::new();
    let cache = Arc::new(MemoryCache::default());
    let cache_dyn: Arc<dyn CacheBackend> = cache.clone();
    let context = ctx(cache_dyn, events);

    context.progress(Some("Scanning"), Some(50.0), Some(100.0));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let stored = cache.get("primes-progress").await.unwrap();
    assert!(stored.is_some());
    let stored = stored.unwrap();
    assert_eq!(stored["current"], 50);
    assert_eq!(stored["text"], "Scanning");
}
