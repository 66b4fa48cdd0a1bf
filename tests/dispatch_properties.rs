// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Routing and isolation guarantees of the dispatch coordinator.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use agent_runtime::context::{clear_dispatch_key_for_current_thread, set_dispatch_key_for_current_thread, DispatchKeyScope};
use agent_runtime::dispatch::{AgentEvent, DispatchCoordinator, HttpCall, NotificationHandler, ThrowableInfo};
use agent_runtime::error::{ConfigurationError, HandlerError};

struct Counting {
    name: String,
    calls: AtomicUsize,
}

impl Counting {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl NotificationHandler for Counting {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn handle(&self, _event: &AgentEvent) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails every call, alternating between an error and a panic.
struct Hostile {
    calls: AtomicUsize,
}

impl NotificationHandler for Hostile {
    fn name(&self) -> String {
        "hostile".to_string()
    }

    fn handle(&self, event: &AgentEvent) -> Result<(), HandlerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 0 {
            panic!("hostile handler refused {:?}", event.kind());
        }
        Err(HandlerError::Rejected("always".to_string()))
    }
}

fn fire_every_event_kind(coordinator: &DispatchCoordinator) {
    coordinator.method_started("com/acme/Job.run");
    coordinator.method_finished("com/acme/Job.run", 1_000, vec![serde_json::json!(1)], None);
    coordinator.method_finished_with_threshold("com/acme/Job.run", 5);
    coordinator.exception_caught("com/acme/Job.run", ThrowableInfo::new("java.io.IOException"));
    coordinator.sql_statement_started("com/acme/Repo.find", "select 1");
    coordinator.sql_query_plan_candidate("com/acme/Repo.find", "select 1");
    coordinator.prepared_statement_started("com/acme/Repo.save", "insert ?", vec![serde_json::json!("x")]);
    coordinator.prepared_statement_batch_started("com/acme/Repo.saveAll", "insert ?", 10);
    coordinator.http_started("okhttp3/RealCall.execute", "https://example.com");
    coordinator.http_finished(HttpCall {
        identifier: "id".to_string(),
        method: "GET".to_string(),
        uri: "https://example.com".to_string(),
        result_code: 200,
        ..Default::default()
    });
    coordinator.cache_call_started("redis/clients/jedis/Jedis.get");
    coordinator.exception_thrown(ThrowableInfo::new("java.lang.IllegalStateException"));
    coordinator.core_pool_size_changed(4);
}

// ============================================================================
// Dispatch isolation
// ============================================================================

#[test]
fn test_hostile_default_handler_never_escapes() {
    let coordinator = DispatchCoordinator::new();
    let hostile = Arc::new(Hostile {
        calls: AtomicUsize::new(0),
    });
    coordinator.register_default(hostile.clone()).unwrap();

    fire_every_event_kind(&coordinator);
    fire_every_event_kind(&coordinator);

    assert_eq!(hostile.calls.load(Ordering::SeqCst), 26);
}

#[test]
fn test_hostile_keyed_handler_never_escapes() {
    let coordinator = DispatchCoordinator::new();
    let key = coordinator
        .register("tenant", Arc::new(Hostile { calls: AtomicUsize::new(0) }))
        .unwrap();

    let _scope = DispatchKeyScope::enter(key);
    fire_every_event_kind(&coordinator);
}

// ============================================================================
// Default-handler fallback
// ============================================================================

#[test]
fn test_default_used_without_key() {
    let coordinator = DispatchCoordinator::new();
    let fallback = Counting::new("default");
    coordinator.register_default(fallback.clone()).unwrap();

    fire_every_event_kind(&coordinator);
    assert_eq!(fallback.calls(), 13);
}

#[test]
fn test_unregistered_key_is_no_op() {
    let coordinator = DispatchCoordinator::new();
    let fallback = Counting::new("default");
    let keyed = Counting::new("tenant-a");
    coordinator.register_default(fallback.clone()).unwrap();
    coordinator.register("app", keyed.clone()).unwrap();

    set_dispatch_key_for_current_thread("tenant-b");
    fire_every_event_kind(&coordinator);
    clear_dispatch_key_for_current_thread();

    assert_eq!(fallback.calls(), 0);
    assert_eq!(keyed.calls(), 0);
}

#[test]
fn test_keys_are_per_thread() {
    let coordinator = Arc::new(DispatchCoordinator::new());
    let a = Counting::new("tenant-a");
    let b = Counting::new("tenant-b");
    coordinator.register("app-a", a.clone()).unwrap();
    coordinator.register("app-b", b.clone()).unwrap();

    let handles: Vec<_> = [("tenant-a", 3), ("tenant-b", 5)]
        .into_iter()
        .map(|(key, n)| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                let _scope = DispatchKeyScope::enter(key);
                for _ in 0..n {
                    coordinator.cache_call_started("redis/clients/jedis/Jedis.get");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 5);
}

// ============================================================================
// Duplicate default rejection
// ============================================================================

#[test]
fn test_duplicate_default_rejected_and_first_kept() {
    let coordinator = DispatchCoordinator::new();
    let first = Counting::new("first");
    let second = Counting::new("second");

    coordinator.register_default(first.clone()).unwrap();
    let err = coordinator.register_default(second.clone()).unwrap_err();
    assert!(matches!(err, ConfigurationError::AlreadyRegistered(_)));

    coordinator.method_started("com/acme/Job.run");
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 0);
}

#[test]
fn test_empty_handler_name_rejected() {
    let coordinator = DispatchCoordinator::new();
    let err = coordinator.register("app", Counting::new("")).unwrap_err();
    assert!(matches!(err, ConfigurationError::InvalidArgument(_)));
}

// ============================================================================
// Threshold clamping
// ============================================================================

#[test]
fn test_negative_thresholds_clamp_to_zero() {
    let coordinator = DispatchCoordinator::new();

    coordinator.set_query_threshold_ms(-1);
    coordinator.set_cache_threshold_ms(-250);
    assert_eq!(coordinator.query_threshold_ms(), 0);
    assert_eq!(coordinator.cache_threshold_ns(), 0);

    coordinator.set_query_threshold_ms(i64::MIN);
    coordinator.set_cache_threshold_ns(i64::MIN);
    assert_eq!(coordinator.query_threshold_ms(), 0);
    assert_eq!(coordinator.cache_threshold_ns(), 0);

    coordinator.set_query_threshold_ms(150);
    assert_eq!(coordinator.query_threshold_ms(), 150);
}
