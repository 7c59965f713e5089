//! Canonical request identity.
//!
//! A [`Urn`] names what a JSON-RPC call asks for, independent of its id or of how the client
//! spelled it. `get_block`, `steemd.database_api.get_block`, and
//! `call ["database_api", "get_block", [1]]` with the same parameters address the same subject.
//!
//! The canonical string form is `namespace[.api].method[.params=<compact JSON>]`, with object
//! keys emitted in sorted order at every depth.

use crate::types::Params;
use serde_json::Value;
use std::{
    fmt,
    hash::{Hash, Hasher},
};
use thiserror::Error;
use tracing::{field, Span};

/// Apis addressable by numeric index in legacy `call` requests.
const NUMERIC_API_MAPPING: [&str; 2] = ["database_api", "login_api"];

const APPBASE_NAMESPACE: &str = "appbase";
const STEEMD_NAMESPACE: &str = "steemd";

/// Errors raised while deriving a URN from a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrnError {
    /// The method could not be split into a known namespace layout.
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// A legacy `call` referenced an api index with no mapping.
    #[error("Invalid namespace api: {namespace}.{api}")]
    InvalidNamespaceApi { namespace: String, api: String },
}

/// Canonical identity of a single JSON-RPC call.
#[derive(Debug, Clone)]
pub struct Urn {
    pub namespace: String,
    pub api: Option<String>,
    pub method: String,
    pub params: Option<Params>,
    canonical: String,
}

impl Urn {
    /// Builds a URN from its parts and computes the canonical form.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        api: Option<String>,
        method: impl Into<String>,
        params: Option<Params>,
    ) -> Self {
        let namespace = namespace.into();
        let method = method.into();

        let mut canonical = String::with_capacity(64);
        canonical.push_str(&namespace);
        if let Some(api) = &api {
            canonical.push('.');
            canonical.push_str(api);
        }
        canonical.push('.');
        canonical.push_str(&method);
        if let Some(params) = &params {
            canonical.push_str(".params=");
            write_canonical(&params.to_value(), &mut canonical);
        }

        Self { namespace, api, method, params, canonical }
    }

    /// Parses the identity of a request from its `method` and `params`.
    ///
    /// # Errors
    ///
    /// Returns [`UrnError::InvalidNamespace`] for methods that cannot be split into
    /// `[namespace.][api.]method` or malformed legacy `call` requests, and
    /// [`UrnError::InvalidNamespaceApi`] for unmapped numeric api indexes.
    pub fn from_request(method: &str, params: Option<&Params>) -> Result<Self, UrnError> {
        let invalid = || UrnError::InvalidNamespace(method.to_string());

        let parts: Vec<&str> = method.split('.').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid());
        }

        match parts.as_slice() {
            [bare] if *bare == "call" => Self::from_call(method, params),
            [bare] => Ok(Self::new(
                STEEMD_NAMESPACE,
                Some("database_api".to_string()),
                *bare,
                params.cloned(),
            )),
            [api, name] if api.ends_with("_api") => {
                Ok(Self::new(APPBASE_NAMESPACE, Some((*api).to_string()), *name, params.cloned()))
            }
            [namespace, name] | [namespace, _, name] if *namespace == "jsonrpc" => Ok(Self::new(
                APPBASE_NAMESPACE,
                Some("jsonrpc".to_string()),
                *name,
                params.cloned(),
            )),
            [namespace, name] => Ok(Self::new(*namespace, None, *name, params.cloned())),
            [namespace, api, name] => {
                Ok(Self::new(*namespace, Some((*api).to_string()), *name, params.cloned()))
            }
            _ => Err(invalid()),
        }
    }

    /// Legacy `call` form: `[api, method]` or `[api, method, params]`.
    fn from_call(method: &str, params: Option<&Params>) -> Result<Self, UrnError> {
        let invalid = || UrnError::InvalidNamespace(method.to_string());

        let Some(Params::Positional(args)) = params else {
            return Err(invalid());
        };

        let (api, call_method, call_params, namespace) = match args.as_slice() {
            [api, call_method] => (api, call_method, None, APPBASE_NAMESPACE),
            [api, call_method, call_params] => {
                let appbase = matches!(api.as_str(), Some("condenser_api" | "jsonrpc"))
                    || call_params.is_object();
                let namespace = if appbase { APPBASE_NAMESPACE } else { STEEMD_NAMESPACE };
                let call_params = Params::from_value(call_params).ok_or_else(invalid)?;
                (api, call_method, call_params, namespace)
            }
            _ => return Err(invalid()),
        };

        let call_method = call_method.as_str().ok_or_else(invalid)?;
        let api = match api {
            Value::String(api) => api.clone(),
            Value::Number(index) => index
                .as_u64()
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| NUMERIC_API_MAPPING.get(i))
                .map(ToString::to_string)
                .ok_or_else(|| UrnError::InvalidNamespaceApi {
                    namespace: STEEMD_NAMESPACE.to_string(),
                    api: index.to_string(),
                })?,
            _ => return Err(invalid()),
        };

        Ok(Self::new(namespace, Some(api), call_method, call_params))
    }

    /// Canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Creates the `jsonrpc` span that carries this identity through logging.
    ///
    /// `id` and `batch_index` are left empty for the request to record.
    #[must_use]
    pub fn log_context(&self) -> Span {
        tracing::debug_span!(
            "jsonrpc",
            urn = %self.canonical,
            namespace = %self.namespace,
            method = %self.method,
            id = field::Empty,
            batch_index = field::Empty,
        )
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl PartialEq for Urn {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Urn {}

impl Hash for Urn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

/// Writes compact JSON with object keys sorted at every depth.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
