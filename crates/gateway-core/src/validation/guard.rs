use super::block::{is_get_block_request, validate_get_block_response, BlockCheckError};
use crate::{errors::GatewayError, types::SingleRequest};
use bytes::Bytes;
use serde_json::Value;
use std::future::Future;
use tracing::error;

/// Diagnostic message attached to responses rejected by the guard.
pub const BAD_UPSTREAM_RESPONSE: &str = "Bad or missing upstream response";

/// A response as returned by an upstream: raw body bytes or an already parsed document.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    Raw(Bytes),
    Json(Value),
}

impl UpstreamPayload {
    /// Parses the payload into JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when raw bytes are not valid JSON.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Raw(bytes) => serde_json::from_slice(bytes),
            Self::Json(value) => Ok(value.clone()),
        }
    }

    /// Best-effort JSON view for diagnostics; unparsable bytes become a string.
    fn diagnostic_value(&self) -> Value {
        match self {
            Self::Raw(bytes) => serde_json::from_slice(bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
            Self::Json(value) => value.clone(),
        }
    }
}

/// Runs an upstream dispatch and checks the answer before it goes anywhere else.
///
/// For `get_block` requests the response must carry the requested block; anything else is
/// returned as dispatched, upstream application errors included.
///
/// # Errors
///
/// Propagates the dispatch error, or returns [`GatewayError::Server`] carrying the request, the
/// offending upstream response, and the [`BlockCheckError`] that rejected it.
pub async fn guard_dispatch<F, Fut>(
    request: &SingleRequest,
    dispatch: F,
) -> Result<UpstreamPayload, GatewayError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<UpstreamPayload, GatewayError>>,
{
    let payload = dispatch().await?;
    if !is_get_block_request(request) {
        return Ok(payload);
    }

    let checked = payload
        .to_json()
        .map_err(|e| BlockCheckError::UnparsableResponse(e.to_string()))
        .and_then(|response| validate_get_block_response(request, &response));

    match checked {
        Ok(()) => Ok(payload),
        Err(cause) => {
            let upstream_response = payload.diagnostic_value();
            request.span().in_scope(|| {
                error!(error = %cause, upstream_response = %upstream_response, "{BAD_UPSTREAM_RESPONSE}");
            });
            Err(GatewayError::Server {
                message: BAD_UPSTREAM_RESPONSE.to_string(),
                request: Box::new(request.to_value()),
                upstream_response: Box::new(upstream_response),
                cause,
            })
        }
    }
}
