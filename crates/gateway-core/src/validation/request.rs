use crate::{
    errors::GatewayError,
    types::{
        JsonRpcRequest, Params, RequestId, RpcRequest, SingleRequest, JSONRPC_REQUEST_KEYS,
        JSONRPC_VERSION,
    },
    urn::Urn,
};
use serde_json::{Map, Value};
use tracing::error;

impl RpcRequest {
    /// Converts an ingress request into a validated [`JsonRpcRequest`].
    ///
    /// `Validated` requests pass through untouched; validation happens once per request.
    ///
    /// # Errors
    ///
    /// See [`validate_request`].
    pub fn validate(self) -> Result<JsonRpcRequest, GatewayError> {
        match self {
            Self::Raw(value) => validate_request(&value),
            Self::Validated(request) => Ok(request),
        }
    }
}

/// Validates a raw JSON-RPC request or batch and parses it into typed form.
///
/// # Errors
///
/// - [`GatewayError::InvalidRequest`] when the value is not an object or a non-empty array of
///   objects, carries unknown keys, has fewer than two keys, a `jsonrpc` other than `"2.0"`,
///   a non-string `method`, an id that is not a number/string/null, or params that are not an
///   array/object/null
/// - [`GatewayError::Urn`] when the method cannot be resolved to a namespace
pub fn validate_request(value: &Value) -> Result<JsonRpcRequest, GatewayError> {
    match value {
        Value::Object(map) => validate_single(map, None).map(JsonRpcRequest::Single),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(invalid("empty batch"));
            }
            items
                .iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(map) => validate_single(map, Some(index)),
                    _ => Err(invalid(format!("batch element {index} is not an object"))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(JsonRpcRequest::Batch)
        }
        _ => Err(invalid("request must be an object or an array")),
    }
}

/// Same check as [`validate_request`], logging instead of failing.
#[must_use]
pub fn is_valid_request(value: &Value) -> bool {
    match validate_request(value) {
        Ok(_) => true,
        Err(e) => {
            error!(error = %e, "invalid jsonrpc request");
            false
        }
    }
}

fn validate_single(
    map: &Map<String, Value>,
    batch_index: Option<usize>,
) -> Result<SingleRequest, GatewayError> {
    if let Some(key) = map.keys().find(|key| !JSONRPC_REQUEST_KEYS.contains(&key.as_str())) {
        return Err(invalid(format!("unexpected key '{key}'")));
    }
    if map.len() < 2 {
        return Err(invalid("too few keys"));
    }
    if map.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(invalid("bad jsonrpc version"));
    }

    let Some(method) = map.get("method").and_then(Value::as_str) else {
        return Err(invalid("method must be a string"));
    };

    let id = match map.get("id") {
        None => None,
        Some(Value::Null) => Some(RequestId::Null),
        Some(Value::Number(n)) => Some(RequestId::Number(n.clone())),
        Some(Value::String(s)) => Some(RequestId::String(s.clone())),
        Some(_) => return Err(invalid("bad jsonrpc id")),
    };

    let params = match map.get("params") {
        None => None,
        Some(raw) => Params::from_value(raw).ok_or_else(|| invalid("bad jsonrpc params"))?,
    };

    let urn = Urn::from_request(method, params.as_ref())?;
    Ok(SingleRequest::new(id, method.to_string(), params, urn, batch_index))
}

fn invalid(reason: impl Into<String>) -> GatewayError {
    GatewayError::InvalidRequest { reason: reason.into() }
}
