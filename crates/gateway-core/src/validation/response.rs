use crate::types::{JSONRPC_NON_ERROR_RESPONSE_KEYS, JSONRPC_RESPONSE_KEYS};
use serde_json::Value;

fn has_response_shape(value: &Value, allowed: &[&str]) -> bool {
    value.as_object().is_some_and(|map| {
        map.len() >= 2 && map.keys().all(|key| allowed.contains(&key.as_str()))
    })
}

/// An object with at least two of `id`, `jsonrpc`, `result`, `error` and nothing else.
#[must_use]
pub fn is_valid_single_response(response: &Value) -> bool {
    has_response_shape(response, JSONRPC_RESPONSE_KEYS)
}

/// As [`is_valid_single_response`], with no `error` key.
#[must_use]
pub fn is_valid_non_error_single_response(response: &Value) -> bool {
    has_response_shape(response, JSONRPC_NON_ERROR_RESPONSE_KEYS)
}
