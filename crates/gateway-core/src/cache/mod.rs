//! Response caching.
//!
//! - [`key`]: deterministic cache identity per request
//! - [`ttl`]: cache policy and irreversible-block TTL resolution
//! - [`store`]: the [`CacheStore`] backend trait and the in-process [`MemoryStore`]
//! - [`gateway`]: [`CacheGateway`], validity-gated reads and detached writes

pub mod gateway;
pub mod key;
pub mod store;
pub mod ttl;

pub use gateway::{is_complete_response, CacheGateway};
pub use key::cache_key;
pub use store::{CacheStore, CacheStoreError, MemoryStore};
pub use ttl::{irreversible_ttl, CacheTtl, DEFAULT_TTL};
