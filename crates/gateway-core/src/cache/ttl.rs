use crate::validation::block::block_num_from_response;
use serde_json::Value;
use std::{fmt, time::Duration};
use tracing::warn;

/// Expiry applied to responses that may still be reorganised out of the chain.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3);

/// Cache policy for a request.
///
/// Converts from the integer convention used by upstream routing tables: `-1` never caches,
/// `-2` never expires once the block is irreversible, `0` never expires, and a positive value
/// is an expiry in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTtl {
    NoCache,
    NoExpireIfIrreversible,
    NoExpire,
    Expire(Duration),
}

impl CacheTtl {
    /// Integer form of this policy.
    #[must_use]
    pub fn as_secs(&self) -> i64 {
        match self {
            Self::NoCache => -1,
            Self::NoExpireIfIrreversible => -2,
            Self::NoExpire => 0,
            Self::Expire(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::NoCache)
    }

    /// Store expiry for a resolved policy: `Some(None)` stores forever, `None` skips the write.
    ///
    /// [`CacheTtl::NoExpireIfIrreversible`] must be resolved with [`irreversible_ttl`] first
    /// and yields `None` here.
    #[must_use]
    pub fn store_expiry(&self) -> Option<Option<Duration>> {
        match self {
            Self::NoCache | Self::NoExpireIfIrreversible => None,
            Self::NoExpire => Some(None),
            Self::Expire(d) => Some(Some(*d)),
        }
    }
}

impl From<i64> for CacheTtl {
    fn from(secs: i64) -> Self {
        match secs {
            -2 => Self::NoExpireIfIrreversible,
            0 => Self::NoExpire,
            s if s > 0 => Self::Expire(Duration::from_secs(s.unsigned_abs())),
            _ => Self::NoCache,
        }
    }
}

impl From<i32> for CacheTtl {
    fn from(secs: i32) -> Self {
        Self::from(i64::from(secs))
    }
}

impl fmt::Display for CacheTtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_secs())
    }
}

/// Resolves [`CacheTtl::NoExpireIfIrreversible`] for a response.
///
/// Responses about blocks at or below the last irreversible block never expire; anything newer
/// gets [`DEFAULT_TTL`]. An empty response or an unknown last irreversible block disables
/// caching.
#[must_use]
pub fn irreversible_ttl(response: &Value, last_irreversible_block_num: Option<u64>) -> CacheTtl {
    let is_empty = match response {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if is_empty {
        warn!("bad/missing response, skipping cache");
        return CacheTtl::NoCache;
    }
    let Some(last_irreversible_block_num) = last_irreversible_block_num else {
        warn!("bad/missing last_irreversible_block_num, skipping cache");
        return CacheTtl::NoCache;
    };

    match block_num_from_response(response) {
        Some(block_num) if block_num <= last_irreversible_block_num => CacheTtl::NoExpire,
        _ => CacheTtl::Expire(DEFAULT_TTL),
    }
}
