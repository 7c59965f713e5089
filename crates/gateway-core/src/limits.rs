//! Request limits enforced before a request is forwarded upstream.
//!
//! Batches are bounded in size, and transaction broadcasts are screened for oversized
//! `custom_json` operations and for operations signed by blacklisted accounts.

use crate::{
    config::LimitsConfig,
    errors::GatewayError,
    types::{JsonRpcRequest, Params, SingleRequest},
};
use ahash::AHashSet;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Maximum `custom_json` payload length in characters.
pub const CUSTOM_JSON_SIZE_LIMIT: usize = 2000;

/// Maximum number of calls in a batch.
pub const DEFAULT_BATCH_SIZE_LIMIT: usize = 50;

static BROADCAST_TRANSACTION_METHODS: LazyLock<AHashSet<&'static str>> = LazyLock::new(|| {
    ["broadcast_transaction", "broadcast_transaction_synchronous"].into_iter().collect()
});

#[must_use]
pub fn is_broadcast_transaction_request(request: &SingleRequest) -> bool {
    BROADCAST_TRANSACTION_METHODS.contains(request.urn.method.as_str())
}

/// Screens requests against configured limits.
#[derive(Debug, Clone)]
pub struct RequestLimiter {
    accounts_blacklist: AHashSet<String>,
    custom_json_size_limit: usize,
    batch_size_limit: usize,
}

impl Default for RequestLimiter {
    fn default() -> Self {
        Self::new(AHashSet::new(), CUSTOM_JSON_SIZE_LIMIT, DEFAULT_BATCH_SIZE_LIMIT)
    }
}

impl RequestLimiter {
    #[must_use]
    pub fn new(
        accounts_blacklist: impl IntoIterator<Item = String>,
        custom_json_size_limit: usize,
        batch_size_limit: usize,
    ) -> Self {
        Self {
            accounts_blacklist: accounts_blacklist.into_iter().collect(),
            custom_json_size_limit,
            batch_size_limit,
        }
    }

    /// Builds a limiter from configuration. A missing section or blacklist means an empty
    /// blacklist.
    #[must_use]
    pub fn from_config(config: Option<&LimitsConfig>) -> Self {
        let Some(config) = config else {
            warn!("no limits configured, using empty accounts_blacklist");
            return Self::default();
        };
        let accounts_blacklist = match &config.accounts_blacklist {
            Some(accounts) => accounts.iter().cloned().collect(),
            None => {
                warn!("no accounts_blacklist configured, using empty accounts_blacklist");
                AHashSet::new()
            }
        };
        Self::new(accounts_blacklist, config.custom_json_size_limit, config.batch_size_limit)
    }

    #[must_use]
    pub fn accounts_blacklist(&self) -> &AHashSet<String> {
        &self.accounts_blacklist
    }

    #[must_use]
    pub fn custom_json_size_limit(&self) -> usize {
        self.custom_json_size_limit
    }

    #[must_use]
    pub fn batch_size_limit(&self) -> usize {
        self.batch_size_limit
    }

    /// Checks a validated request, batch size first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::BatchSize`] for oversized batches, and the first error from
    /// [`RequestLimiter::check_single`] otherwise.
    pub fn check(&self, request: &JsonRpcRequest) -> Result<(), GatewayError> {
        if let JsonRpcRequest::Batch(requests) = request {
            if requests.len() > self.batch_size_limit {
                return Err(GatewayError::BatchSize {
                    size: requests.len(),
                    limit: self.batch_size_limit,
                });
            }
        }
        request.requests().iter().try_for_each(|single| self.check_single(single))
    }

    /// Checks a single call. Only broadcast methods are inspected.
    ///
    /// The size check runs before the blacklist check.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidParams`] when the transaction cannot be located or read
    /// - [`GatewayError::CustomJsonOpLength`] when any `custom_json` payload exceeds the limit
    /// - [`GatewayError::Limits`] when a `custom_json` is signed by a blacklisted account
    pub fn check_single(&self, request: &SingleRequest) -> Result<(), GatewayError> {
        if !is_broadcast_transaction_request(request) {
            return Ok(());
        }
        let _guard = request.span().enter();

        let trx = match &request.urn.params {
            Some(params @ Params::Positional(_)) => params.first(),
            Some(params @ Params::Keyed(_)) => params.get("trx"),
            None => None,
        }
        .ok_or_else(|| invalid_params("missing transaction"))?;

        let operations = trx
            .get("operations")
            .and_then(Value::as_array)
            .ok_or_else(|| invalid_params("transaction has no operations"))?;

        let custom_json_ops: Vec<&Value> = operations
            .iter()
            .filter_map(|op| match op.as_array().map(Vec::as_slice) {
                Some([name, body]) if name.as_str() == Some("custom_json") => Some(body),
                _ => None,
            })
            .collect();
        if custom_json_ops.is_empty() {
            return Ok(());
        }

        self.limit_custom_json_op_length(&custom_json_ops)?;
        self.limit_custom_json_account(&custom_json_ops)
    }

    fn limit_custom_json_op_length(&self, ops: &[&Value]) -> Result<(), GatewayError> {
        for op in ops {
            let json = op
                .get("json")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid_params("custom_json operation has no json"))?;
            let size = json.chars().count();
            if size > self.custom_json_size_limit {
                debug!(size, limit = self.custom_json_size_limit, "custom_json too large");
                return Err(GatewayError::CustomJsonOpLength {
                    size_limit: self.custom_json_size_limit,
                });
            }
        }
        Ok(())
    }

    fn limit_custom_json_account(&self, ops: &[&Value]) -> Result<(), GatewayError> {
        for op in ops {
            let auths = op
                .get("required_posting_auths")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid_params("custom_json operation has no required_posting_auths"))?;
            if let Some(account) = auths
                .iter()
                .filter_map(Value::as_str)
                .find(|account| self.accounts_blacklist.contains(*account))
            {
                warn!(account, "blacklisted account in custom_json");
                return Err(GatewayError::Limits {
                    reason: format!("account {account} is blacklisted"),
                });
            }
        }
        Ok(())
    }
}

fn invalid_params(reason: &str) -> GatewayError {
    GatewayError::InvalidParams { reason: reason.to_string() }
}
