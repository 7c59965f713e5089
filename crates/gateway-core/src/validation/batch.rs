//! Reconciling upstream responses with the requests that produced them.
//!
//! A single request pairs with one response object; a batch pairs with an array of exactly the
//! same length, matched positionally. Batches are one level deep, which [`JsonRpcRequest`]
//! already guarantees on the request side.

use super::{
    block::{is_get_block_request, validate_get_block_response, BlockCheckError},
    response::{is_valid_non_error_single_response, is_valid_single_response},
};
use crate::{
    errors::GatewayError,
    types::{JsonRpcRequest, SingleRequest},
};
use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// Why a response does not reconcile with its request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("expected a response object")]
    ExpectedObject,

    #[error("expected a response array")]
    ExpectedArray,

    #[error("batch of {requests} requests answered with {responses} responses")]
    LengthMismatch { requests: usize, responses: usize },

    #[error("malformed response")]
    Malformed,

    #[error("malformed response at batch index {0}")]
    MalformedElement(usize),

    #[error(transparent)]
    Block(#[from] BlockCheckError),
}

#[derive(Clone, Copy)]
enum ErrorPolicy {
    AllowError,
    RejectError,
}

fn reconcile_single(
    request: &SingleRequest,
    response: &Value,
    policy: ErrorPolicy,
) -> Result<(), ReconcileError> {
    if !response.is_object() {
        return Err(ReconcileError::ExpectedObject);
    }
    let well_formed = match policy {
        ErrorPolicy::AllowError => is_valid_single_response(response),
        ErrorPolicy::RejectError => is_valid_non_error_single_response(response),
    };
    if !well_formed {
        return Err(request
            .batch_index
            .map_or(ReconcileError::Malformed, ReconcileError::MalformedElement));
    }
    if is_get_block_request(request) {
        validate_get_block_response(request, response)?;
    }
    Ok(())
}

fn reconcile(
    request: &JsonRpcRequest,
    response: &Value,
    policy: ErrorPolicy,
) -> Result<(), ReconcileError> {
    match request {
        JsonRpcRequest::Single(single) => reconcile_single(single, response, policy),
        JsonRpcRequest::Batch(requests) => {
            let responses = response.as_array().ok_or(ReconcileError::ExpectedArray)?;
            if requests.is_empty() || requests.len() != responses.len() {
                return Err(ReconcileError::LengthMismatch {
                    requests: requests.len(),
                    responses: responses.len(),
                });
            }
            requests
                .iter()
                .zip(responses)
                .try_for_each(|(request, response)| reconcile_single(request, response, policy))
        }
    }
}

fn log_rejection(request: &JsonRpcRequest, e: &ReconcileError, message: &'static str) {
    match request.requests().first() {
        Some(first) if !request.is_batch() => {
            first.span().in_scope(|| error!(error = %e, "{message}"));
        }
        _ => error!(error = %e, batch_size = request.len(), "{message}"),
    }
}

/// Structural and semantic check; error responses are acceptable.
#[must_use]
pub fn is_valid_response(request: &JsonRpcRequest, response: &Value) -> bool {
    reconcile(request, response, ErrorPolicy::AllowError)
        .inspect_err(|e| log_rejection(request, e, "response does not match request"))
        .is_ok()
}

/// As [`is_valid_response`], additionally rejecting any element carrying an `error` key.
///
/// This is the check that gates caching a whole response.
#[must_use]
pub fn is_valid_non_error_response(request: &JsonRpcRequest, response: &Value) -> bool {
    reconcile(request, response, ErrorPolicy::RejectError)
        .inspect_err(|e| log_rejection(request, e, "response is not cacheable"))
        .is_ok()
}

/// Raising form of [`is_valid_non_error_response`].
///
/// # Errors
///
/// Returns [`GatewayError::UpstreamResponse`] describing the first mismatch.
pub fn validate_response(request: &JsonRpcRequest, response: &Value) -> Result<(), GatewayError> {
    reconcile(request, response, ErrorPolicy::RejectError)
        .map_err(|e| GatewayError::UpstreamResponse { reason: e.to_string() })
}
