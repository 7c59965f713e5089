//! Batch reconciliation and the `get_block` response guard, exercised on realistic payloads.

use crate::mock_infrastructure::{block_id, block_result, request, single};
use bytes::Bytes;
use gateway_core::{
    errors::GatewayError,
    validation::{
        guard_dispatch, is_valid_non_error_response, is_valid_response, validate_response,
        BlockCheckError, UpstreamPayload, BAD_UPSTREAM_RESPONSE,
    },
};
use serde_json::json;

#[test]
fn test_three_requests_two_responses() {
    let batch = request(json!([
        {"id": 1, "jsonrpc": "2.0", "method": "get_config"},
        {"id": 2, "jsonrpc": "2.0", "method": "get_config"},
        {"id": 3, "jsonrpc": "2.0", "method": "get_config"},
    ]));
    let response = json!([
        {"id": 1, "jsonrpc": "2.0", "result": {}},
        {"id": 2, "jsonrpc": "2.0", "result": {}},
    ]);

    assert!(!is_valid_response(&batch, &response));
    let err = validate_response(&batch, &response).unwrap_err();
    assert_eq!(err.code(), 1100);
}

#[test]
fn test_batch_with_error_element() {
    let batch = request(json!([
        {"id": 1, "jsonrpc": "2.0", "method": "get_block", "params": [10]},
        {"id": 2, "jsonrpc": "2.0", "method": "get_accounts", "params": [["alice"]]},
    ]));
    let response = json!([
        {"id": 1, "jsonrpc": "2.0", "result": block_result(10)},
        {"id": 2, "jsonrpc": "2.0", "error": {"code": -32000, "message": "missing"}},
    ]);

    assert!(is_valid_response(&batch, &response));
    assert!(!is_valid_non_error_response(&batch, &response));
}

#[test]
fn test_batch_with_wrong_block() {
    let batch = request(json!([
        {"id": 1, "jsonrpc": "2.0", "method": "get_block", "params": [10]},
        {"id": 2, "jsonrpc": "2.0", "method": "get_block", "params": [11]},
    ]));
    let response = json!([
        {"id": 1, "jsonrpc": "2.0", "result": block_result(10)},
        {"id": 2, "jsonrpc": "2.0", "result": block_result(12)},
    ]);

    assert!(!is_valid_response(&batch, &response));
}

#[test]
fn test_appbase_nested_block_layout() {
    let req = request(json!({
        "id": 1,
        "jsonrpc": "2.0",
        "method": "block_api.get_block",
        "params": {"block_num": 8_000_000}
    }));
    let response = json!({
        "id": 1,
        "jsonrpc": "2.0",
        "result": {"block": {"block_id": block_id(8_000_000), "transactions": []}}
    });

    assert!(is_valid_non_error_response(&req, &response));
}

#[tokio::test]
async fn test_guard_rejects_wrong_block_with_diagnostics() {
    let req = single(json!({"id": 5, "jsonrpc": "2.0", "method": "get_block", "params": [1000]}));
    let body = json!({"id": 5, "jsonrpc": "2.0", "result": block_result(1001)});
    let raw = Bytes::from(body.to_string());

    let err = guard_dispatch(&req, || async move { Ok(UpstreamPayload::Raw(raw)) }).await.unwrap_err();

    match &err {
        GatewayError::Server { message, request, upstream_response, cause } => {
            assert_eq!(message, BAD_UPSTREAM_RESPONSE);
            assert_eq!(request["params"], json!([1000]));
            assert_eq!(**upstream_response, body);
            assert_eq!(*cause, BlockCheckError::Mismatch { requested: 1000, returned: 1001 });
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let rendered = err.to_response(json!(5)).to_value();
    assert_eq!(rendered["error"]["code"], -32000);
    assert_eq!(rendered["error"]["message"], "Server error");
}

#[tokio::test]
async fn test_guard_passes_other_methods_untouched() {
    let req = single(json!({"id": 1, "jsonrpc": "2.0", "method": "get_accounts", "params": [["a"]]}));
    let body = json!({"id": 1, "jsonrpc": "2.0", "error": {"code": -32003, "message": "x"}});
    let payload = UpstreamPayload::Json(body.clone());

    let passed = guard_dispatch(&req, || async move { Ok(payload) }).await.unwrap();

    assert_eq!(passed, UpstreamPayload::Json(body));
}

#[tokio::test]
async fn test_guard_propagates_dispatch_failure() {
    let req = single(json!({"id": 1, "jsonrpc": "2.0", "method": "get_block", "params": [1]}));

    let err = guard_dispatch(&req, || async {
        Err(GatewayError::UpstreamResponse { reason: "connection reset".to_string() })
    })
    .await
    .unwrap_err();

    assert_eq!(err.code(), 1100);
}

#[tokio::test]
async fn test_guard_rejects_unparsable_block_body() {
    let req = single(json!({"id": 1, "jsonrpc": "2.0", "method": "get_block", "params": [1]}));

    let err = guard_dispatch(&req, || async {
        Ok(UpstreamPayload::Raw(Bytes::from_static(b"<html>502</html>")))
    })
    .await
    .unwrap_err();

    match err {
        GatewayError::Server { upstream_response, cause, .. } => {
            assert_eq!(*upstream_response, json!("<html>502</html>"));
            assert!(matches!(cause, BlockCheckError::UnparsableResponse(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
