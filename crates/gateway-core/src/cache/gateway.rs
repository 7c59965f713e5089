use super::{
    key::cache_key,
    store::CacheStore,
    ttl::{irreversible_ttl, CacheTtl},
};
use crate::{
    config::AppConfig,
    types::{JsonRpcRequest, RequestCacheAttributes, SingleRequest, JSONRPC_VERSION},
    validation::{
        is_get_block_request, is_get_dynamic_global_properties_request,
        is_valid_get_block_response, is_valid_non_error_response,
        is_valid_non_error_single_response,
    },
};
use bytes::Bytes;
use futures::future::join_all;
use serde_json::{json, Value};
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument, Span};

/// Async get/set front for a [`CacheStore`], gated by TTL policy and response validity.
///
/// Writes are detached: [`CacheGateway::set`] spawns the store write and returns at once. The
/// handle it hands back exists for tests and shutdown; the request path never awaits it. A
/// failed write is logged and dropped, never retried, and concurrent identical requests may
/// each rewrite the same key.
pub struct CacheGateway<S: CacheStore> {
    store: Arc<S>,
    enabled: bool,
    read_timeout: Duration,
    /// `0` until the first dynamic global properties response is seen.
    last_irreversible_block_num: AtomicU64,
}

impl<S: CacheStore> CacheGateway<S> {
    #[must_use]
    pub fn new(store: Arc<S>, read_timeout: Duration) -> Self {
        Self { store, enabled: true, read_timeout, last_irreversible_block_num: AtomicU64::new(0) }
    }

    #[must_use]
    pub fn from_config(store: Arc<S>, config: &AppConfig) -> Self {
        Self { enabled: config.cache.enabled, ..Self::new(store, config.cache_read_timeout()) }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Looks up a key. Store errors and timeouts are logged and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        if !self.enabled {
            return None;
        }
        match tokio::time::timeout(self.read_timeout, self.store.get(key)).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(key, error = %e, "cache get failed");
                None
            }
            Err(_) => {
                warn!(key, timeout = ?self.read_timeout, "cache get timed out");
                None
            }
        }
    }

    /// Schedules a detached store write.
    ///
    /// Unresolved or non-cacheable TTLs skip the write. [`CacheTtl::NoExpire`] stores without
    /// expiry and [`CacheTtl::Expire`] passes its duration through.
    ///
    /// # Panics
    ///
    /// Panics when a write is scheduled outside a Tokio runtime.
    pub fn set(&self, key: &str, value: Bytes, ttl: CacheTtl) -> Option<JoinHandle<()>> {
        if !self.enabled {
            return None;
        }
        let Some(expiry) = ttl.store_expiry() else {
            debug!(key, %ttl, "skipping cache set");
            return None;
        };

        let store = Arc::clone(&self.store);
        let key = key.to_string();
        let write = async move {
            if let Err(e) = store.set(&key, value, expiry).await {
                warn!(key = %key, error = %e, "background cache set failed");
            } else {
                debug!(key = %key, ttl_secs = expiry.map(|d| d.as_secs()), "cached response");
            }
        };
        Some(tokio::spawn(write.instrument(Span::current())))
    }

    /// Caches a raw upstream body if it parses and carries no `error` key.
    ///
    /// Never fails: unparsable bodies are logged and skipped.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime, see [`CacheGateway::set`].
    pub fn cache_if_valid(
        &self,
        raw: &Bytes,
        attrs: &RequestCacheAttributes,
    ) -> Option<JoinHandle<()>> {
        let response: Value = match serde_json::from_slice(raw) {
            Ok(response) => response,
            Err(e) => {
                error!(
                    key = %attrs.key,
                    upstream_url = %attrs.upstream_url,
                    error = %e,
                    "unable to parse upstream response, skipping cache"
                );
                return None;
            }
        };
        if response.get("error").is_some() {
            debug!(key = %attrs.key, "error response, skipping cache");
            return None;
        }
        let ttl = self.resolve_ttl(attrs.ttl, &response);
        self.set(&attrs.key, raw.clone(), ttl)
    }

    /// Cached response for a request, re-addressed to the request's id.
    pub async fn get_response(&self, request: &SingleRequest, ttl: CacheTtl) -> Option<Value> {
        if !ttl.is_cacheable() {
            return None;
        }
        let key = cache_key(request);
        let raw = self.get(&key).instrument(request.span().clone()).await?;

        request.span().in_scope(|| match serde_json::from_slice::<Value>(&raw) {
            Ok(cached) => merge_cached_response(request, &cached),
            Err(e) => {
                warn!(key = %key, error = %e, "unparsable cache entry");
                None
            }
        })
    }

    /// Positional cache lookups; `None` marks a miss. A missing TTL counts as non-cacheable.
    pub async fn get_batch_responses(
        &self,
        requests: &[SingleRequest],
        ttls: &[CacheTtl],
    ) -> Vec<Option<Value>> {
        join_all(requests.iter().enumerate().map(|(i, request)| {
            self.get_response(request, ttls.get(i).copied().unwrap_or(CacheTtl::NoCache))
        }))
        .await
    }

    /// Caches a parsed single response when it is error-free and, for `get_block`, carries the
    /// requested block.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime, see [`CacheGateway::set`].
    pub fn cache_response(
        &self,
        request: &SingleRequest,
        response: &Value,
        ttl: CacheTtl,
    ) -> Option<JoinHandle<()>> {
        if !ttl.is_cacheable() {
            return None;
        }
        let _guard = request.span().enter();

        if !is_valid_non_error_single_response(response) {
            debug!("uncacheable response: is_valid_non_error_single_response");
            return None;
        }
        if is_get_block_request(request) && !is_valid_get_block_response(request, response) {
            debug!("uncacheable response: invalid get_block response");
            return None;
        }

        let ttl = self.resolve_ttl(ttl, response);
        match serde_json::to_vec(response) {
            Ok(body) => self.set(&cache_key(request), Bytes::from(body), ttl),
            Err(e) => {
                error!(error = %e, "unable to serialize response for cache");
                None
            }
        }
    }

    /// Per-element [`CacheGateway::cache_response`] over a positionally aligned batch.
    ///
    /// # Panics
    ///
    /// Panics outside a Tokio runtime, see [`CacheGateway::set`].
    pub fn cache_batch_response(
        &self,
        requests: &[SingleRequest],
        responses: &[Value],
        ttls: &[CacheTtl],
    ) -> Vec<JoinHandle<()>> {
        requests
            .iter()
            .zip(responses)
            .zip(ttls)
            .filter_map(|((request, response), ttl)| self.cache_response(request, response, *ttl))
            .collect()
    }

    /// Resolves [`CacheTtl::NoExpireIfIrreversible`] against the tracked irreversible block.
    #[must_use]
    pub fn resolve_ttl(&self, ttl: CacheTtl, response: &Value) -> CacheTtl {
        match ttl {
            CacheTtl::NoExpireIfIrreversible => {
                irreversible_ttl(response, self.last_irreversible_block_num())
            }
            other => other,
        }
    }

    #[must_use]
    pub fn last_irreversible_block_num(&self) -> Option<u64> {
        match self.last_irreversible_block_num.load(Ordering::Acquire) {
            0 => None,
            n => Some(n),
        }
    }

    /// Records a new last irreversible block. The value never moves backwards.
    pub fn update_last_irreversible_block_num(&self, block_num: u64) {
        let previous = self.last_irreversible_block_num.fetch_max(block_num, Ordering::AcqRel);
        if block_num > previous {
            debug!(last_irreversible_block_num = block_num, "updated last irreversible block");
        }
    }

    /// Records `last_irreversible_block_num` from a dynamic global properties response.
    pub fn track_last_irreversible_block(&self, request: &SingleRequest, response: &Value) {
        if !is_get_dynamic_global_properties_request(request) {
            return;
        }
        match response
            .get("result")
            .and_then(|result| result.get("last_irreversible_block_num"))
            .and_then(Value::as_u64)
        {
            Some(block_num) => self.update_last_irreversible_block_num(block_num),
            None => request.span().in_scope(|| {
                warn!("skipping update of last_irreversible_block_num");
            }),
        }
    }
}

/// Whether cached lookups fully answer a request: every element hit and the assembled
/// response passes the non-error check.
#[must_use]
pub fn is_complete_response(request: &JsonRpcRequest, responses: &[Option<Value>]) -> bool {
    if responses.len() != request.len() || responses.iter().any(Option::is_none) {
        return false;
    }
    let assembled = match request {
        JsonRpcRequest::Single(_) => responses[0].clone().unwrap_or(Value::Null),
        JsonRpcRequest::Batch(_) => Value::Array(responses.iter().flatten().cloned().collect()),
    };
    is_valid_non_error_response(request, &assembled)
}

/// Rebuilds a cached response for the current request: the cached id is never returned.
fn merge_cached_response(request: &SingleRequest, cached: &Value) -> Option<Value> {
    let result = cached.get("result")?;
    Some(json!({"id": request.id_value(), "jsonrpc": JSONRPC_VERSION, "result": result}))
}
