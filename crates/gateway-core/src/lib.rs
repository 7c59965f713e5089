//! # Gateway Core
//!
//! Caching and response-validation core of a JSON-RPC gateway in front of steemd/appbase
//! blockchain nodes.
//!
//! - **[`validation`]**: structural request/response checks, `get_block` semantic checks,
//!   batch reconciliation, and the response guard around upstream dispatch.
//!
//! - **[`limits`]**: batch size and `custom_json` broadcast limits.
//!
//! - **[`urn`]**: canonical request identity.
//!
//! - **[`cache`]**: cache keys, TTL policy, the backing store, and the cache gateway.
//!
//! - **[`proxy`]**: the engine wiring these together around an upstream.
//!
//! - **[`config`]**: layered configuration loading.
//!
//! ## Request Flow
//!
//! ```text
//! raw JSON ──► validate ──► limits ──► cache get ──► guarded dispatch ──► cache set
//!                │             │           │                 │          (detached)
//!                ▼             ▼           ▼                 ▼
//!          InvalidRequest   LimitsError   hit          ServerError on
//!                                                      wrong block
//! ```

pub mod cache;
pub mod config;
pub mod errors;
pub mod limits;
pub mod proxy;
pub mod types;
pub mod urn;
pub mod validation;
