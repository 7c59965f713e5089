//! End-to-end request handling through `GatewayEngine`.
//!
//! Cache writes are detached from the request path, so tests that depend on a previous
//! response being cached wait for the write with `poll_until` before issuing the next request.

use crate::mock_infrastructure::{
    block_result, custom_json_broadcast, poll_until, requested_block, RecordingStore,
    ScriptedUpstream,
};
use gateway_core::{
    cache::{CacheGateway, MemoryStore},
    limits::RequestLimiter,
    proxy::GatewayEngine,
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};

const WAIT: Duration = Duration::from_secs(2);

fn memory_engine(upstream: ScriptedUpstream) -> GatewayEngine<MemoryStore, ScriptedUpstream> {
    let store = Arc::new(MemoryStore::new(Some(Duration::from_secs(180)), 2000).unwrap());
    let cache = Arc::new(CacheGateway::new(store, Duration::from_secs(1)));
    GatewayEngine::new(cache, RequestLimiter::default(), Arc::new(upstream))
}

fn recording_engine(
    upstream: ScriptedUpstream,
) -> (GatewayEngine<RecordingStore, ScriptedUpstream>, Arc<RecordingStore>) {
    let store = Arc::new(RecordingStore::new());
    let cache = Arc::new(CacheGateway::new(Arc::clone(&store), Duration::from_secs(1)));
    (GatewayEngine::new(cache, RequestLimiter::default(), Arc::new(upstream)), store)
}

/// Serves the requested block for every `get_block` call.
fn honest_node() -> ScriptedUpstream {
    ScriptedUpstream::new()
        .on("get_block", |req| block_result(requested_block(req).unwrap_or(0)))
        .on("get_config", |_| json!({"STEEM_BLOCK_INTERVAL": 3}))
}

fn get_block(id: u64, block_num: u64) -> Value {
    json!({"id": id, "jsonrpc": "2.0", "method": "get_block", "params": [block_num]})
}

fn error_code(response: &Value) -> Option<i64> {
    response["error"]["code"].as_i64()
}

#[tokio::test]
async fn test_repeat_request_served_from_cache_with_new_id() {
    let engine = memory_engine(honest_node());

    let first = engine.process_request(get_block(1, 1000)).await;
    assert_eq!(first["id"], 1);
    assert_eq!(first["result"]["block_id"], block_result(1000)["block_id"]);

    let store = Arc::clone(engine.cache().store());
    assert!(poll_until(WAIT, || !store.is_empty()).await);

    let second = engine.process_request(get_block(77, 1000)).await;
    assert_eq!(second["id"], 77);
    assert_eq!(second["jsonrpc"], "2.0");
    assert_eq!(second["result"], first["result"]);
}

#[tokio::test]
async fn test_cache_hit_skips_upstream() {
    let upstream = Arc::new(honest_node());
    let store = Arc::new(MemoryStore::new(None, 100).unwrap());
    let cache = Arc::new(CacheGateway::new(Arc::clone(&store), Duration::from_secs(1)));
    let engine = GatewayEngine::new(cache, RequestLimiter::default(), Arc::clone(&upstream));

    engine.process_request(get_block(1, 5)).await;
    assert!(poll_until(WAIT, || store.len() == 1).await);
    engine.process_request(get_block(2, 5)).await;
    engine.process_request(get_block(3, 5)).await;

    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_wrong_block_becomes_server_error() {
    let lying_node = ScriptedUpstream::new().on("get_block", |_| block_result(999));
    let (engine, store) = recording_engine(lying_node);

    let response = engine.process_request(get_block(4, 1000)).await;

    assert_eq!(response["id"], 4);
    assert_eq!(error_code(&response), Some(-32000));
    let data = &response["error"]["data"];
    assert_eq!(data["upstream_response"]["result"]["block_id"], block_result(999)["block_id"]);
    assert!(data["error_id"].is_string());

    tokio::task::yield_now().await;
    assert!(store.sets().is_empty());
}

#[tokio::test]
async fn test_missing_block_is_server_error() {
    let (engine, store) = recording_engine(ScriptedUpstream::new());

    let response = engine.process_request(get_block(1, 99_999_999)).await;

    assert_eq!(error_code(&response), Some(-32000));
    tokio::task::yield_now().await;
    assert!(store.sets().is_empty());
}

#[tokio::test]
async fn test_upstream_error_returned_but_not_cached() {
    let failing = ScriptedUpstream::new()
        .on("get_accounts", |_| json!({"error": {"code": -32003, "message": "assert"}}))
        .parsed();
    let upstream = Arc::new(failing);
    let store = Arc::new(RecordingStore::new());
    let cache = Arc::new(CacheGateway::new(Arc::clone(&store), Duration::from_secs(1)));
    let engine = GatewayEngine::new(cache, RequestLimiter::default(), Arc::clone(&upstream));

    let call = json!({"id": 9, "jsonrpc": "2.0", "method": "get_accounts", "params": [["alice"]]});
    let first = engine.process_request(call.clone()).await;
    let second = engine.process_request(call).await;

    assert_eq!(error_code(&first), Some(-32003));
    assert_eq!(first["id"], 9);
    assert_eq!(second, first);
    assert_eq!(upstream.calls(), 2);
    assert!(store.sets().is_empty());
}

#[tokio::test]
async fn test_batch_mixes_cache_hits_and_upstream_calls() {
    let upstream = Arc::new(honest_node());
    let store = Arc::new(MemoryStore::new(None, 100).unwrap());
    let cache = Arc::new(CacheGateway::new(Arc::clone(&store), Duration::from_secs(1)));
    let engine = GatewayEngine::new(cache, RequestLimiter::default(), Arc::clone(&upstream));

    engine.process_request(get_block(1, 10)).await;
    assert!(poll_until(WAIT, || store.len() == 1).await);

    let batch = json!([
        get_block(20, 10),
        {"id": 21, "jsonrpc": "2.0", "method": "get_config"},
        get_block(22, 11),
    ]);
    let response = engine.process_request(batch).await;

    let items = response.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["id"], 20);
    assert_eq!(items[0]["result"]["block_id"], block_result(10)["block_id"]);
    assert_eq!(items[1]["id"], 21);
    assert_eq!(items[1]["result"]["STEEM_BLOCK_INTERVAL"], 3);
    assert_eq!(items[2]["id"], 22);
    assert_eq!(items[2]["result"]["block_id"], block_result(11)["block_id"]);
    assert_eq!(upstream.calls(), 3);
}

#[tokio::test]
async fn test_fully_cached_batch_never_dispatches() {
    let upstream = Arc::new(honest_node());
    let store = Arc::new(MemoryStore::new(None, 100).unwrap());
    let cache = Arc::new(CacheGateway::new(Arc::clone(&store), Duration::from_secs(1)));
    let engine = GatewayEngine::new(cache, RequestLimiter::default(), Arc::clone(&upstream));

    let batch = json!([get_block(1, 3), get_block(2, 4)]);
    engine.process_request(batch.clone()).await;
    assert!(poll_until(WAIT, || store.len() == 2).await);

    let response = engine.process_request(batch).await;
    assert_eq!(response.as_array().map(Vec::len), Some(2));
    assert_eq!(upstream.calls(), 2);
}

#[tokio::test]
async fn test_batch_element_failure_rendered_in_place() {
    let node = ScriptedUpstream::new()
        .on("get_block", |req| match requested_block(req) {
            Some(7) => block_result(8),
            other => block_result(other.unwrap_or(0)),
        })
        .on("get_config", |_| json!({}));
    let (engine, _store) = recording_engine(node);

    let batch = json!([
        get_block(1, 6),
        get_block(2, 7),
        {"id": 3, "jsonrpc": "2.0", "method": "get_config"},
    ]);
    let response = engine.process_request(batch).await;
    let items = response.as_array().unwrap();

    assert!(items[0].get("result").is_some());
    assert_eq!(items[1]["id"], 2);
    assert_eq!(error_code(&items[1]), Some(-32000));
    assert!(items[2].get("result").is_some());
}

#[tokio::test]
async fn test_non_cacheable_ttl_always_dispatches() {
    let upstream = Arc::new(honest_node().default_ttl(-1));
    let store = Arc::new(RecordingStore::new());
    let cache = Arc::new(CacheGateway::new(Arc::clone(&store), Duration::from_secs(1)));
    let engine = GatewayEngine::new(cache, RequestLimiter::default(), Arc::clone(&upstream));

    for id in 0..3 {
        engine.process_request(get_block(id, 50)).await;
    }

    tokio::task::yield_now().await;
    assert_eq!(upstream.calls(), 3);
    assert_eq!(store.get_count(), 0);
    assert!(store.sets().is_empty());
}

#[tokio::test]
async fn test_irreversible_blocks_cached_without_expiry() {
    let node = honest_node()
        .on("get_dynamic_global_properties", |_| {
            json!({"head_block_number": 120, "last_irreversible_block_num": 100})
        })
        .ttl("get_block", -2)
        .ttl("get_dynamic_global_properties", -1);
    let (engine, store) = recording_engine(node);

    let props = json!({"id": 1, "jsonrpc": "2.0", "method": "get_dynamic_global_properties"});
    engine.process_request(props).await;
    assert_eq!(engine.cache().last_irreversible_block_num(), Some(100));

    engine.process_request(get_block(2, 90)).await;
    engine.process_request(get_block(3, 110)).await;
    assert!(poll_until(WAIT, || store.sets().len() == 2).await);

    let sets = store.sets();
    let irreversible = sets.iter().find(|s| s.key.ends_with("params=[90]")).unwrap();
    let reversible = sets.iter().find(|s| s.key.ends_with("params=[110]")).unwrap();
    assert_eq!(irreversible.ttl, None);
    assert_eq!(reversible.ttl, Some(Duration::from_secs(3)));
}

#[tokio::test]
async fn test_irreversible_ttl_skips_cache_until_block_known() {
    let (engine, store) = recording_engine(honest_node().ttl("get_block", -2));

    let response = engine.process_request(get_block(1, 90)).await;

    assert!(response.get("result").is_some());
    tokio::task::yield_now().await;
    assert!(store.sets().is_empty());
}

#[tokio::test]
async fn test_unparsable_body_is_parse_error() {
    let engine = memory_engine(honest_node());

    let response = engine.process_bytes(b"{\"id\": 1, \"method\": ").await;

    assert_eq!(error_code(&response), Some(-32700));
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn test_invalid_requests_rejected_before_dispatch() {
    let upstream = Arc::new(honest_node());
    let store = Arc::new(MemoryStore::new(None, 10).unwrap());
    let cache = Arc::new(CacheGateway::new(store, Duration::from_secs(1)));
    let engine = GatewayEngine::new(cache, RequestLimiter::default(), Arc::clone(&upstream));

    let wrong_version = json!({"id": 1, "jsonrpc": "1.0", "method": "get_block", "params": [1]});
    assert_eq!(error_code(&engine.process_request(wrong_version).await), Some(-32600));

    let empty_batch = json!([]);
    assert_eq!(error_code(&engine.process_request(empty_batch).await), Some(-32600));

    let bad_namespace =
        json!({"id": 2, "jsonrpc": "2.0", "method": "steemd.database_api.get_block.extra"});
    let response = engine.process_request(bad_namespace).await;
    assert_eq!(error_code(&response), Some(1200));
    assert_eq!(response["id"], 2);

    let bad_api = json!({"id": 3, "jsonrpc": "2.0", "method": "call", "params": [7, "get_block", [1]]});
    assert_eq!(error_code(&engine.process_request(bad_api).await), Some(1300));

    assert_eq!(upstream.calls(), 0);
}

#[tokio::test]
async fn test_limits_enforced_before_dispatch() {
    let upstream = Arc::new(ScriptedUpstream::new().on("broadcast_transaction", |_| json!({})));
    let store = Arc::new(MemoryStore::new(None, 10).unwrap());
    let cache = Arc::new(CacheGateway::new(store, Duration::from_secs(1)));
    let limiter = RequestLimiter::new(["spammer".to_string()], 2000, 2);
    let engine = GatewayEngine::new(cache, limiter, Arc::clone(&upstream));

    let oversized = custom_json_broadcast(1, &"x".repeat(2001), &["alice"]);
    assert_eq!(error_code(&engine.process_request(oversized).await), Some(1800));

    let blacklisted = custom_json_broadcast(2, "{}", &["spammer"]);
    assert_eq!(error_code(&engine.process_request(blacklisted).await), Some(1700));

    let batch = json!([get_block(1, 1), get_block(2, 2), get_block(3, 3)]);
    let response = engine.process_request(batch).await;
    assert_eq!(error_code(&response), Some(1600));
    assert_eq!(response["error"]["data"]["jrpc_batch_size"], 3);

    assert_eq!(upstream.calls(), 0);

    let allowed = custom_json_broadcast(3, "{}", &["alice"]);
    let response = engine.process_request(allowed).await;
    assert!(response.get("result").is_some());
    assert_eq!(upstream.calls(), 1);
}

#[tokio::test]
async fn test_store_outage_degrades_to_upstream() {
    let upstream = Arc::new(honest_node());
    let store = Arc::new(RecordingStore::new());
    store.fail_gets(true);
    store.fail_sets(true);
    let cache = Arc::new(CacheGateway::new(Arc::clone(&store), Duration::from_secs(1)));
    let engine = GatewayEngine::new(cache, RequestLimiter::default(), Arc::clone(&upstream));

    let first = engine.process_request(get_block(1, 12)).await;
    let second = engine.process_request(get_block(2, 12)).await;

    assert!(first.get("result").is_some());
    assert!(second.get("result").is_some());
    assert_eq!(upstream.calls(), 2);
}
