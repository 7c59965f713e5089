use crate::types::SingleRequest;

/// Cache key for a request: the canonical string form of its URN.
///
/// Requests that differ only in id, in the spelling of their method, or in the insertion order
/// of keyed params share a key.
#[must_use]
pub fn cache_key(request: &SingleRequest) -> String {
    request.urn.to_string()
}
