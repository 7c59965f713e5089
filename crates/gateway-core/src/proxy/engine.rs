use crate::{
    cache::{is_complete_response, CacheGateway, CacheStore, CacheTtl},
    errors::GatewayError,
    limits::RequestLimiter,
    types::{JsonRpcRequest, RequestCacheAttributes, RpcRequest, SingleRequest},
    validation::{guard_dispatch, is_valid_single_response, UpstreamPayload},
};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

/// Upstream selection and dispatch, owned by the transport layer.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// Cache key, TTL, and upstream URL for a request.
    fn cache_attributes(&self, request: &SingleRequest) -> RequestCacheAttributes;

    /// Sends a request upstream.
    ///
    /// Upstream application errors are successful dispatches carrying an `error` member;
    /// `Err` is reserved for transport failures.
    async fn dispatch(&self, request: &SingleRequest) -> Result<UpstreamPayload, GatewayError>;
}

/// Request path: validation, limits, cache lookup, guarded dispatch, cache population.
pub struct GatewayEngine<S: CacheStore, U: Upstream> {
    cache: Arc<CacheGateway<S>>,
    limiter: RequestLimiter,
    upstream: Arc<U>,
}

impl<S: CacheStore, U: Upstream> GatewayEngine<S, U> {
    #[must_use]
    pub fn new(cache: Arc<CacheGateway<S>>, limiter: RequestLimiter, upstream: Arc<U>) -> Self {
        Self { cache, limiter, upstream }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<CacheGateway<S>> {
        &self.cache
    }

    #[must_use]
    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    /// Handles a raw request body. Failures are rendered as JSON-RPC error responses.
    pub async fn process_bytes(&self, body: &[u8]) -> Value {
        match serde_json::from_slice::<Value>(body) {
            Ok(raw) => self.process_request(raw).await,
            Err(e) => {
                let err = GatewayError::Parse { reason: e.to_string() };
                warn!(error = %err, "unparsable request body");
                err.to_response(Value::Null).to_value()
            }
        }
    }

    /// Handles a parsed request. Failures are rendered as JSON-RPC error responses.
    pub async fn process_request(&self, raw: Value) -> Value {
        let id = raw.get("id").cloned().unwrap_or(Value::Null);
        match self.handle(RpcRequest::Raw(raw)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, code = e.code(), "request rejected");
                e.to_response(id).to_value()
            }
        }
    }

    /// Validates, limits, and answers a request.
    ///
    /// # Errors
    ///
    /// Returns the validation or limit failure for the whole request, or the dispatch failure
    /// of a single request. Failures of batch elements are rendered in place instead.
    pub async fn handle(&self, request: RpcRequest) -> Result<Value, GatewayError> {
        let request = request.validate()?;
        self.limiter.check(&request)?;

        match &request {
            JsonRpcRequest::Single(single) => self.handle_single(single).await,
            JsonRpcRequest::Batch(requests) => Ok(self.handle_batch(&request, requests).await),
        }
    }

    async fn handle_single(&self, request: &SingleRequest) -> Result<Value, GatewayError> {
        let attrs = self.upstream.cache_attributes(request);
        if let Some(cached) = self.cache.get_response(request, attrs.ttl).await {
            request.span().in_scope(|| debug!("cache hit"));
            return Ok(cached);
        }
        self.fetch(request, &attrs).await
    }

    async fn handle_batch(&self, batch: &JsonRpcRequest, requests: &[SingleRequest]) -> Value {
        let attrs: Vec<RequestCacheAttributes> =
            requests.iter().map(|request| self.upstream.cache_attributes(request)).collect();
        let ttls: Vec<CacheTtl> = attrs.iter().map(|attrs| attrs.ttl).collect();

        let cached = self.cache.get_batch_responses(requests, &ttls).await;
        if is_complete_response(batch, &cached) {
            debug!(batch_size = requests.len(), "batch served from cache");
            return Value::Array(cached.into_iter().flatten().collect());
        }

        let responses = join_all(requests.iter().zip(&attrs).zip(cached).map(
            |((request, attrs), hit)| async move {
                if let Some(hit) = hit {
                    return hit;
                }
                match self.fetch(request, attrs).await {
                    Ok(response) => response,
                    Err(e) => {
                        request.span().in_scope(|| warn!(error = %e, "batch element failed"));
                        e.to_response(request.id_value()).to_value()
                    }
                }
            },
        ))
        .await;
        Value::Array(responses)
    }

    /// Dispatches upstream through the response guard and populates the cache.
    async fn fetch(
        &self,
        request: &SingleRequest,
        attrs: &RequestCacheAttributes,
    ) -> Result<Value, GatewayError> {
        let payload = guard_dispatch(request, || self.upstream.dispatch(request))
            .instrument(request.span().clone())
            .await?;

        let response = match payload {
            UpstreamPayload::Raw(body) => {
                let response: Value = serde_json::from_slice(&body).map_err(|e| {
                    GatewayError::UpstreamResponse { reason: format!("unparsable body: {e}") }
                })?;
                if is_valid_single_response(&response) {
                    request.span().in_scope(|| self.cache.cache_if_valid(&body, attrs));
                }
                response
            }
            UpstreamPayload::Json(response) => {
                self.cache.cache_response(request, &response, attrs.ttl);
                response
            }
        };

        if !is_valid_single_response(&response) {
            return Err(GatewayError::UpstreamResponse {
                reason: "response is not a jsonrpc response object".to_string(),
            });
        }
        self.cache.track_last_irreversible_block(request, &response);
        Ok(response)
    }
}
