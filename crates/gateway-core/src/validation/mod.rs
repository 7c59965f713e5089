//! Request and response validation.
//!
//! Two families of checks live here. `validate_*` functions return a `Result` and are used
//! where a failure aborts processing. `is_valid_*` functions return `bool`, log the reason for
//! a rejection inside the request's span, and never propagate an error; they gate decisions
//! such as whether a response may be cached.

pub mod batch;
pub mod block;
pub mod guard;
pub mod request;
pub mod response;

pub use batch::{is_valid_non_error_response, is_valid_response, validate_response, ReconcileError};
pub use block::{
    block_num_from_id, check_get_block_response, is_get_block_header_request,
    is_get_block_request, is_get_dynamic_global_properties_request, is_valid_get_block_response,
    validate_get_block_response, BlockCheck, BlockCheckError, BLOCK_API_NAMESPACES,
};
pub use guard::{guard_dispatch, UpstreamPayload, BAD_UPSTREAM_RESPONSE};
pub use request::{is_valid_request, validate_request};
pub use response::{is_valid_non_error_single_response, is_valid_single_response};
