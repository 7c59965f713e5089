use crate::{
    types::{JsonRpcError, JsonRpcResponse},
    urn::UrnError,
    validation::BlockCheckError,
};
use serde_json::{json, Map, Value};

/// Client-visible failures, each mapped to a JSON-RPC error code.
///
/// `Display` carries the diagnostic detail for logs; [`GatewayError::message`] is the fixed
/// text a client sees.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("Parse error: {reason}")]
    Parse { reason: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Invalid params: {reason}")]
    InvalidParams { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),

    /// An upstream answered with a well-formed response that fails semantic validation.
    ///
    /// Carries everything needed to reproduce the failure from logs.
    #[error("{message}: {cause}")]
    Server {
        message: String,
        request: Box<Value>,
        upstream_response: Box<Value>,
        #[source]
        cause: BlockCheckError,
    },

    /// Upstream response is missing, unparsable, or misaligned with the request.
    #[error("Bad or missing upstream response: {reason}")]
    UpstreamResponse { reason: String },

    #[error(transparent)]
    Urn(#[from] UrnError),

    #[error("JSONRPC batch size of {size} exceeds {limit}")]
    BatchSize { size: usize, limit: usize },

    #[error("Request exceeded limit: {reason}")]
    Limits { reason: String },

    #[error("Custom JSON operation size limit of {size_limit} exceeded")]
    CustomJsonOpLength { size_limit: usize },
}

impl GatewayError {
    /// JSON-RPC error code for this failure.
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::Parse { .. } => -32700,
            Self::InvalidRequest { .. } => -32600,
            Self::InvalidParams { .. } => -32602,
            Self::Internal(_) => -32603,
            Self::Server { .. } => -32000,
            Self::UpstreamResponse { .. } => 1100,
            Self::Urn(UrnError::InvalidNamespace(_)) => 1200,
            Self::Urn(UrnError::InvalidNamespaceApi { .. }) => 1300,
            Self::BatchSize { .. } => 1600,
            Self::Limits { .. } => 1700,
            Self::CustomJsonOpLength { .. } => 1800,
        }
    }

    /// Client-facing error message.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Parse { .. } => "Parse error".to_string(),
            Self::InvalidRequest { .. } => "Invalid Request".to_string(),
            Self::InvalidParams { .. } => "Invalid params".to_string(),
            Self::Internal(_) => "Internal Error".to_string(),
            Self::Server { .. } => "Server error".to_string(),
            Self::UpstreamResponse { .. } => "Bad or missing upstream response".to_string(),
            Self::Urn(UrnError::InvalidNamespace(namespace)) => {
                format!("Invalid JSONRPC method namespace {namespace}")
            }
            Self::Urn(UrnError::InvalidNamespaceApi { namespace, api }) => {
                format!("Invalid JSONRPC method namespace, unable to resolve {namespace}.{api}")
            }
            Self::BatchSize { .. } | Self::CustomJsonOpLength { .. } => self.to_string(),
            Self::Limits { .. } => "Request exceeded limit".to_string(),
        }
    }

    fn data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("error_id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        match self {
            Self::Parse { reason }
            | Self::InvalidRequest { reason }
            | Self::InvalidParams { reason }
            | Self::UpstreamResponse { reason }
            | Self::Limits { reason } => {
                data.insert("reason".to_string(), Value::String(reason.clone()));
            }
            Self::Server { message, upstream_response, cause, .. } => {
                data.insert("message".to_string(), Value::String(message.clone()));
                data.insert("upstream_response".to_string(), upstream_response.as_ref().clone());
                data.insert("reason".to_string(), Value::String(cause.to_string()));
            }
            Self::BatchSize { size, limit } => {
                data.insert("jrpc_batch_size".to_string(), json!(size));
                data.insert("jrpc_batch_size_limit".to_string(), json!(limit));
            }
            Self::Internal(_) | Self::Urn(_) | Self::CustomJsonOpLength { .. } => {}
        }
        data
    }

    /// Renders this failure as a JSON-RPC error response for the given request id.
    ///
    /// Each rendering gets a fresh `error_id` so a client report can be matched to logs.
    #[must_use]
    pub fn to_response(&self, id: Value) -> JsonRpcResponse {
        JsonRpcResponse::error(
            JsonRpcError {
                code: self.code(),
                message: self.message(),
                data: Some(Value::Object(self.data())),
            },
            id,
        )
    }
}
