//! Core type definitions for JSON-RPC requests, responses, and cache attributes.
//!
//! # Type Categories
//!
//! ## Request Types
//! - [`RpcRequest`]: ingress form, either untyped JSON or an already validated request
//! - [`JsonRpcRequest`]: validated single request or batch
//! - [`SingleRequest`]: one validated call with its [`Urn`] and logging span
//!
//! ## Response Types
//! - [`JsonRpcResponse`], [`JsonRpcError`]: rendered responses produced by the gateway itself
//!
//! Upstream responses stay as [`serde_json::Value`]: the validators reason about their key
//! sets, which a typed struct would erase.
//!
//! ## Cache Types
//! - [`RequestCacheAttributes`]: per-request cache key, TTL, and upstream URL

use crate::{cache::CacheTtl, cache::key::cache_key, urn::Urn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use tracing::{field, Span};

/// JSON-RPC protocol version constant to avoid repeated allocations.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for the JSON-RPC version string.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Keys a JSON-RPC request object may carry.
pub const JSONRPC_REQUEST_KEYS: &[&str] = &["id", "jsonrpc", "method", "params"];

/// Keys a JSON-RPC response object may carry.
pub const JSONRPC_RESPONSE_KEYS: &[&str] = &["id", "jsonrpc", "result", "error"];

/// Keys a successful (cacheable) JSON-RPC response object may carry.
pub const JSONRPC_NON_ERROR_RESPONSE_KEYS: &[&str] = &["id", "jsonrpc", "result"];

/// JSON-RPC request identifier.
///
/// An absent id is modelled as `Option::None` on [`SingleRequest`], distinct from an explicit
/// `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
    Null,
}

impl RequestId {
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Number(n) => Value::Number(n.clone()),
            Self::String(s) => Value::String(s.clone()),
            Self::Null => Value::Null,
        }
    }
}

/// Request parameters, either positional or keyed.
///
/// Keyed parameters are order-independent: the canonical [`Urn`] form sorts their keys, so two
/// requests differing only in key insertion order share an identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    Positional(Vec<Value>),
    Keyed(Map<String, Value>),
}

impl Params {
    /// Converts a raw `params` value. `null` is treated as absent.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Option<Self>> {
        match value {
            Value::Null => Some(None),
            Value::Array(items) => Some(Some(Self::Positional(items.clone()))),
            Value::Object(map) => Some(Some(Self::Keyed(map.clone()))),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Positional(items) => Value::Array(items.clone()),
            Self::Keyed(map) => Value::Object(map.clone()),
        }
    }

    /// First positional parameter, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        match self {
            Self::Positional(items) => items.first(),
            Self::Keyed(_) => None,
        }
    }

    /// Keyed parameter lookup, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Positional(_) => None,
            Self::Keyed(map) => map.get(key),
        }
    }
}

/// A single validated JSON-RPC call.
///
/// Constructed once at ingress by [`crate::validation::validate_request`] and read-only
/// afterwards. Each request owns a `jsonrpc` tracing span carrying its URN, id, and batch
/// position; components log inside that span instead of a shared logger.
#[derive(Debug, Clone)]
pub struct SingleRequest {
    pub id: Option<RequestId>,
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    pub params: Option<Params>,
    pub urn: Urn,
    pub batch_index: Option<usize>,
    span: Span,
}

impl SingleRequest {
    pub(crate) fn new(
        id: Option<RequestId>,
        method: String,
        params: Option<Params>,
        urn: Urn,
        batch_index: Option<usize>,
    ) -> Self {
        let span = urn.log_context();
        if let Some(id) = &id {
            span.record("id", field::debug(id));
        }
        if let Some(index) = batch_index {
            span.record("batch_index", index);
        }
        Self { id, jsonrpc: JSONRPC_VERSION_COW, method, params, urn, batch_index, span }
    }

    /// Logging context for this request.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// The request id as JSON, `null` when absent.
    #[must_use]
    pub fn id_value(&self) -> Value {
        self.id.as_ref().map_or(Value::Null, RequestId::to_value)
    }

    /// Re-renders the request as a JSON-RPC object. An absent id stays absent.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(4);
        if let Some(id) = &self.id {
            map.insert("id".to_string(), id.to_value());
        }
        map.insert("jsonrpc".to_string(), Value::String(self.jsonrpc.to_string()));
        map.insert("method".to_string(), Value::String(self.method.clone()));
        if let Some(params) = &self.params {
            map.insert("params".to_string(), params.to_value());
        }
        Value::Object(map)
    }
}

/// A validated request: one call or a one-level batch of calls.
#[derive(Debug, Clone)]
pub enum JsonRpcRequest {
    Single(SingleRequest),
    Batch(Vec<SingleRequest>),
}

impl JsonRpcRequest {
    #[must_use]
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    /// All calls in positional order.
    #[must_use]
    pub fn requests(&self) -> &[SingleRequest] {
        match self {
            Self::Single(request) => std::slice::from_ref(request),
            Self::Batch(requests) => requests,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.requests().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests().is_empty()
    }
}

/// Ingress form of a request.
///
/// [`RpcRequest::validate`](crate::validation) is the only transition from `Raw` to a
/// [`JsonRpcRequest`]; a `Validated` request passes through untouched.
#[derive(Debug, Clone)]
pub enum RpcRequest {
    Raw(Value),
    Validated(JsonRpcRequest),
}

impl From<Value> for RpcRequest {
    fn from(value: Value) -> Self {
        Self::Raw(value)
    }
}

impl From<JsonRpcRequest> for RpcRequest {
    fn from(request: JsonRpcRequest) -> Self {
        Self::Validated(request)
    }
}

/// JSON-RPC 2.0 response rendered by the gateway.
///
/// A response contains either a `result` or an `error`, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    #[must_use]
    pub fn success(result: Value, id: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, result: Some(result), error: None, id }
    }

    #[must_use]
    pub fn error(error: JsonRpcError, id: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, result: None, error: Some(error), id }
    }

    /// Renders the response as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(3);
        map.insert("id".to_string(), self.id.clone());
        map.insert("jsonrpc".to_string(), Value::String(self.jsonrpc.to_string()));
        if let Some(result) = &self.result {
            map.insert("result".to_string(), result.clone());
        }
        if let Some(error) = &self.error {
            let mut err = Map::with_capacity(3);
            err.insert("code".to_string(), Value::from(error.code));
            err.insert("message".to_string(), Value::String(error.message.clone()));
            if let Some(data) = &error.data {
                err.insert("data".to_string(), data.clone());
            }
            map.insert("error".to_string(), Value::Object(err));
        }
        Value::Object(map)
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Cache attributes attached to a request before it reaches the cache gateway.
///
/// Supplied by the upstream-selection collaborator. `ttl` follows the integer convention of
/// [`CacheTtl`]: negative is non-cacheable, zero never expires, positive is seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCacheAttributes {
    pub key: String,
    pub ttl: CacheTtl,
    pub upstream_url: String,
}

impl RequestCacheAttributes {
    /// Builds attributes for a request, deriving the key from its URN.
    #[must_use]
    pub fn for_request(
        request: &SingleRequest,
        ttl: impl Into<CacheTtl>,
        upstream_url: impl Into<String>,
    ) -> Self {
        Self { key: cache_key(request), ttl: ttl.into(), upstream_url: upstream_url.into() }
    }
}
