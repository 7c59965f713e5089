//! Test helper functions and fixtures.

use gateway_core::{
    types::{JsonRpcRequest, SingleRequest},
    validation::validate_request,
};
use serde_json::{json, Value};
use tokio::time::{sleep, Duration, Instant};

/// Validates a raw request, panicking on rejection.
#[must_use]
pub fn request(raw: Value) -> JsonRpcRequest {
    validate_request(&raw).unwrap()
}

/// Validates a raw single call.
#[must_use]
pub fn single(raw: Value) -> SingleRequest {
    match request(raw) {
        JsonRpcRequest::Single(single) => single,
        JsonRpcRequest::Batch(_) => panic!("expected a single request"),
    }
}

/// Block id whose leading 8 hex characters encode `block_num`.
#[must_use]
pub fn block_id(block_num: u64) -> String {
    format!("{block_num:08x}b0c1d2e3f4a5b6c7d8e9f0a1b2c3d4e5f6a7b8c9")
}

/// A `get_block` result for `block_num` in the flat steemd layout.
#[must_use]
pub fn block_result(block_num: u64) -> Value {
    json!({
        "previous": block_id(block_num.saturating_sub(1)),
        "timestamp": "2018-01-01T00:00:00",
        "witness": "initminer",
        "transactions": [],
        "block_id": block_id(block_num),
    })
}

/// Requested height of a `get_block` call, positional or keyed.
#[must_use]
pub fn requested_block(request: &SingleRequest) -> Option<u64> {
    let params = request.urn.params.as_ref()?;
    params.first().or_else(|| params.get("block_num")).and_then(Value::as_u64)
}

/// A `custom_json` broadcast signed by `auths`.
#[must_use]
pub fn custom_json_broadcast(id: u64, json_payload: &str, auths: &[&str]) -> Value {
    json!({
        "id": id,
        "jsonrpc": "2.0",
        "method": "broadcast_transaction",
        "params": [{
            "ref_block_num": 1,
            "ref_block_prefix": 2,
            "expiration": "2018-01-01T00:00:00",
            "operations": [["custom_json", {
                "required_auths": [],
                "required_posting_auths": auths,
                "id": "follow",
                "json": json_payload,
            }]],
            "extensions": [],
            "signatures": [],
        }]
    })
}

/// Polls until a condition becomes true, or times out.
pub async fn poll_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    condition()
}
