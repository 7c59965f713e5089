//! Semantic checks for the `get_block` family.
//!
//! Upstream nodes occasionally answer a `get_block` call with a well-formed response for a
//! different block. A block id encodes its height in its first four bytes, so the response can
//! be checked against the requested height without decoding the block.

use crate::types::{Params, SingleRequest};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

/// Namespaces that serve chain data.
pub const BLOCK_API_NAMESPACES: &[&str] = &["steemd", "appbase"];

fn is_block_api_method(request: &SingleRequest, method: &str) -> bool {
    BLOCK_API_NAMESPACES.contains(&request.urn.namespace.as_str()) && request.urn.method == method
}

#[must_use]
pub fn is_get_block_request(request: &SingleRequest) -> bool {
    is_block_api_method(request, "get_block")
}

#[must_use]
pub fn is_get_block_header_request(request: &SingleRequest) -> bool {
    is_block_api_method(request, "get_block_header")
}

#[must_use]
pub fn is_get_dynamic_global_properties_request(request: &SingleRequest) -> bool {
    is_block_api_method(request, "get_dynamic_global_properties")
}

/// Block height encoded in the leading 8 hex characters of a block id.
#[must_use]
pub fn block_num_from_id(block_id: &str) -> Option<u64> {
    let prefix = if block_id.len() > 8 { block_id.get(..8)? } else { block_id };
    if prefix.is_empty() {
        return None;
    }
    u64::from_str_radix(prefix, 16).ok()
}

/// Outcome of a successful semantic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCheck {
    /// The response carries the requested block.
    Valid,
    /// `result` is null: the block does not exist yet.
    NotReady { requested: u64 },
}

/// Reasons a `get_block` response cannot be accepted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockCheckError {
    #[error("request is not a get_block request")]
    NotGetBlock,

    #[error("cannot read requested block number from params")]
    BadParams,

    #[error("jsonrpc response did not contain result")]
    MissingResult,

    #[error("result did not contain a block_id")]
    MissingBlockId,

    #[error("unparsable block_id: {0}")]
    BadBlockId(String),

    #[error("request block_num {requested} != response block_num {returned}")]
    Mismatch { requested: u64, returned: u64 },

    #[error("block {requested} does not exist yet")]
    NotReady { requested: u64 },

    #[error("upstream response is not valid JSON: {0}")]
    UnparsableResponse(String),
}

/// Whole non-negative numbers only; `100.0` is height 100, `100.5` is not a height.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::float_cmp)]
fn whole_number(n: &serde_json::Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// Requested height: first positional param or keyed `block_num`, as integer or numeric string.
fn requested_block_num(request: &SingleRequest) -> Result<u64, BlockCheckError> {
    let raw = match &request.urn.params {
        Some(params @ Params::Positional(_)) => params.first(),
        Some(params @ Params::Keyed(_)) => params.get("block_num"),
        None => None,
    };
    match raw {
        Some(Value::Number(n)) => whole_number(n).ok_or(BlockCheckError::BadParams),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| BlockCheckError::BadParams),
        _ => Err(BlockCheckError::BadParams),
    }
}

/// Checks that a `get_block` response carries the requested block.
///
/// The block id is read from `result.block_id`, falling back to `result.block.block_id`.
///
/// # Errors
///
/// Returns a [`BlockCheckError`] describing why the response cannot be accepted. A null
/// `result` is not an error; it yields [`BlockCheck::NotReady`].
pub fn check_get_block_response(
    request: &SingleRequest,
    response: &Value,
) -> Result<BlockCheck, BlockCheckError> {
    if !is_get_block_request(request) {
        return Err(BlockCheckError::NotGetBlock);
    }
    let requested = requested_block_num(request)?;

    let result = response.get("result").ok_or(BlockCheckError::MissingResult)?;
    if result.is_null() {
        return Ok(BlockCheck::NotReady { requested });
    }

    let block_id = result
        .get("block_id")
        .or_else(|| result.get("block").and_then(|block| block.get("block_id")))
        .ok_or(BlockCheckError::MissingBlockId)?;
    let block_id = block_id.as_str().ok_or_else(|| BlockCheckError::BadBlockId(block_id.to_string()))?;
    let returned =
        block_num_from_id(block_id).ok_or_else(|| BlockCheckError::BadBlockId(block_id.to_string()))?;

    if requested == returned {
        Ok(BlockCheck::Valid)
    } else {
        Err(BlockCheckError::Mismatch { requested, returned })
    }
}

/// Boolean form of [`check_get_block_response`]. Only [`BlockCheck::Valid`] is accepted.
#[must_use]
pub fn is_valid_get_block_response(request: &SingleRequest, response: &Value) -> bool {
    let _guard = request.span().enter();
    match check_get_block_response(request, response) {
        Ok(BlockCheck::Valid) => true,
        Ok(BlockCheck::NotReady { requested }) => {
            debug!(requested_block_num = requested, "block does not exist yet");
            false
        }
        Err(BlockCheckError::Mismatch { requested, returned }) => {
            error!(
                request_block_num = requested,
                response_block_num = returned,
                "request_block != response block_num"
            );
            false
        }
        Err(e) => {
            error!(error = %e, "invalid get_block response");
            false
        }
    }
}

/// Raising form of [`check_get_block_response`]. A block that does not exist yet is an error.
///
/// # Errors
///
/// Returns the [`BlockCheckError`] from the check, or [`BlockCheckError::NotReady`].
pub fn validate_get_block_response(
    request: &SingleRequest,
    response: &Value,
) -> Result<(), BlockCheckError> {
    match check_get_block_response(request, response)? {
        BlockCheck::Valid => Ok(()),
        BlockCheck::NotReady { requested } => Err(BlockCheckError::NotReady { requested }),
    }
}

/// Height of the block a response describes, for TTL decisions.
///
/// Looks at `result.block.block_id`, then `result.header.previous` (+1), then
/// `result.block_id`, then `result.previous` (+1). Height 0 counts as unknown.
#[must_use]
pub fn block_num_from_response(response: &Value) -> Option<u64> {
    let result = response.get("result")?;
    let id_at = |path: &[&str]| {
        path.iter()
            .try_fold(result, |value, key| value.get(key))
            .and_then(Value::as_str)
            .and_then(block_num_from_id)
    };

    let num = id_at(&["block", "block_id"])
        .or_else(|| id_at(&["header", "previous"]).map(|n| n + 1))
        .or_else(|| id_at(&["block_id"]))
        .or_else(|| id_at(&["previous"]).map(|n| n + 1))?;
    (num > 0).then_some(num)
}
