//! Cache store tests: manager idempotence, shared named caches, LRU bounds
//! and fingerprint keying of payloads.

use std::sync::Arc;

use serde_json::json;

use opdispatch::cache::{fingerprint, CacheEntry, CacheManager, CacheOptions, CachePolicy};
use opdispatch::config::ServiceConfig;
use opdispatch::context::InvocationContext;
use opdispatch::dispatcher::{CallTarget, Dispatcher, Operation, OperationResponse};
use opdispatch::transport::{Transport, TransportError, TransportResponse};

mod common;

struct NoTransport;

impl Transport for NoTransport {
    fn send(
        &self,
        _method: &http::Method,
        url: &str,
        _headers: &[(String, String)],
        _body: &[u8],
        _timeout: std::time::Duration,
    ) -> Result<TransportResponse, TransportError> {
        Err(TransportError::Other(format!("unexpected remote call to {url}")))
    }
}

fn entry(n: u64) -> CacheEntry {
    CacheEntry {
        status: 200,
        payload: json!({ "n": n }),
    }
}

#[test]
fn create_is_idempotent_and_preserves_entries() {
    common::setup();
    let manager = CacheManager::new();
    let store = manager.create("orders", &CacheOptions::default());
    store.set("k", entry(1)).unwrap();

    // A second create for the same name returns the same store, entries
    // intact, even with different options.
    let again = manager.create(
        "orders",
        &CacheOptions {
            max_entries: Some(1),
        },
    );
    assert_eq!(again.get("k").unwrap(), Some(entry(1)));
}

#[test]
fn unknown_cache_names_are_absent() {
    common::setup();
    let manager = CacheManager::new();
    assert!(manager.get("nope").is_none());
}

#[test]
fn bounded_store_evicts_least_recently_used() {
    common::setup();
    let manager = CacheManager::new();
    let store = manager.create(
        "small",
        &CacheOptions {
            max_entries: Some(2),
        },
    );
    store.set("a", entry(1)).unwrap();
    store.set("b", entry(2)).unwrap();
    // Touch "a" so "b" becomes the eviction candidate.
    assert!(store.get("a").unwrap().is_some());
    store.set("c", entry(3)).unwrap();

    assert!(store.get("a").unwrap().is_some());
    assert!(store.get("b").unwrap().is_none());
    assert!(store.get("c").unwrap().is_some());
}

#[test]
fn fingerprint_ignores_key_order_but_not_values() {
    common::setup();
    let a = fingerprint(&json!({ "x": 1, "y": [1, 2] }));
    let b = fingerprint(&json!({ "y": [1, 2], "x": 1 }));
    let c = fingerprint(&json!({ "x": 2, "y": [1, 2] }));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn operations_can_share_a_named_cache() {
    common::setup();
    let config = ServiceConfig::from_yaml("service:\n  name: orders\n").unwrap();
    let mut dispatcher = Dispatcher::new(&config, Arc::new(NoTransport));
    unsafe {
        dispatcher
            .add(
                Operation::new("get", |req| {
                    req.reply(OperationResponse::ok(json!({ "ok": true, "from": "get" })))
                })
                .cache(CachePolicy::new().named("shared")),
            )
            .unwrap();
        dispatcher
            .add(
                Operation::new("peek", |req| {
                    req.reply(OperationResponse::ok(json!({ "ok": true, "from": "peek" })))
                })
                .cache(CachePolicy::new().named("shared")),
            )
            .unwrap();
    }

    let ctx = InvocationContext::new();
    // Same payload fingerprint, same named cache: the second operation sees
    // the entry stored by the first.
    let first = dispatcher
        .call(&ctx, &CallTarget::new("orders:get"), json!({ "id": 1 }))
        .unwrap();
    let second = dispatcher
        .call(&ctx, &CallTarget::new("orders:peek"), json!({ "id": 1 }))
        .unwrap();
    assert_eq!(first["from"], "get");
    assert_eq!(second["from"], "get");
}

#[test]
fn key_generators_partition_a_shared_cache() {
    common::setup();
    let config = ServiceConfig::from_yaml("service:\n  name: orders\n").unwrap();
    let mut dispatcher = Dispatcher::new(&config, Arc::new(NoTransport));
    unsafe {
        dispatcher
            .add(
                Operation::new("get", |req| {
                    req.reply(OperationResponse::ok(json!({ "ok": true, "from": "get" })))
                })
                .cache(
                    CachePolicy::new()
                        .named("shared")
                        .key_generator(|_payload| "get".to_string()),
                ),
            )
            .unwrap();
        dispatcher
            .add(
                Operation::new("peek", |req| {
                    req.reply(OperationResponse::ok(json!({ "ok": true, "from": "peek" })))
                })
                .cache(
                    CachePolicy::new()
                        .named("shared")
                        .key_generator(|_payload| "peek".to_string()),
                ),
            )
            .unwrap();
    }

    let ctx = InvocationContext::new();
    let first = dispatcher
        .call(&ctx, &CallTarget::new("orders:get"), json!({ "id": 1 }))
        .unwrap();
    let second = dispatcher
        .call(&ctx, &CallTarget::new("orders:peek"), json!({ "id": 1 }))
        .unwrap();
    assert_eq!(first["from"], "get");
    assert_eq!(second["from"], "peek");
}
