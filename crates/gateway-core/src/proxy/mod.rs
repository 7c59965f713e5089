//! Request processing engine.
//!
//! [`GatewayEngine`] drives a request through the gateway; the transport layer supplies an
//! [`Upstream`] that knows where requests go and how long their answers may be cached.
//!
//! # Request Processing Flow
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌──────────────┐
//! │  Validation  │ ─── Invalid ──► Error Response
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ RequestLimit │ ─── Exceeded ──► Error Response
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ Cache Lookup │ ─── Hit ──► Cached Response (request id)
//! └──────┬───────┘
//!        │ Miss
//!        ▼
//! ┌──────────────┐
//! │   Upstream   │
//! │  (guarded)   │ ─── Wrong block ──► ServerError
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ Cache Write  │ (detached)
//! └──────┬───────┘
//!        ▼
//!    Response
//! ```

pub mod engine;

pub use engine::{GatewayEngine, Upstream};
