//! JSON-RPC over HTTP backend client.
//!
//! Two dialects share one transport:
//!
//! - **Bitcoin Core** (no `method` configured): `getblockhash(height)`, then
//!   `getsilentpaymentblockdata(hash, dust_limit, filter_spent)`.
//! - **Generic** (`method` configured): a single call with `[height]`,
//!   followed by an options object when filters are set.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use sp_audit_core::{BackendConfig, TweakSet};
use tracing::debug;

use crate::auth;
use crate::client::{BackendClient, CallGuard};
use crate::error::{BackendError, Result};
use crate::http::build_http;
use crate::normalize::normalize_json;

/// Bitcoin Core's `RPC_INVALID_PARAMETER`, returned for heights past the tip.
const RPC_INVALID_PARAMETER: i64 = -8;

/// JSON-RPC client.
#[derive(Debug)]
pub struct RpcClient {
    config: BackendConfig,
    http: reqwest::Client,
    guard: CallGuard,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(config: BackendConfig) -> sp_audit_core::Result<Self> {
        let http = build_http(&config)?;
        let guard = CallGuard::new(&config);
        Ok(Self {
            config,
            http,
            guard,
            next_id: AtomicU64::new(1),
        })
    }

    /// Whether this client speaks the Bitcoin Core two-step dialect.
    pub fn is_bitcoin_core(&self) -> bool {
        self.config.method.is_none()
    }

    async fn fetch_core(&self, height: u64) -> Result<TweakSet> {
        let hash = self.call("1.0", height, "getblockhash", json!([height])).await?;
        let hash = hash
            .as_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BackendError::Malformed(format!("no block hash returned for height {}", height)))?
            .to_string();

        let params = json!([
            hash,
            self.config.dust_limit.unwrap_or(0),
            self.config.filter_spent.unwrap_or(false),
        ]);
        self.guard.permit().await;
        let data = self
            .call("1.0", height, "getsilentpaymentblockdata", params)
            .await?;
        normalize_json(height, &data)
    }

    async fn fetch_generic(&self, method: &str, height: u64) -> Result<TweakSet> {
        let mut params = vec![json!(height)];
        let mut options = Map::new();
        if let Some(spent) = self.config.filter_spent {
            options.insert("filter_spent".into(), json!(spent));
        }
        if let Some(dust) = self.config.dust_limit {
            options.insert("dust_limit".into(), json!(dust));
        }
        if !options.is_empty() {
            params.push(Value::Object(options));
        }

        let result = self.call("2.0", height, method, Value::Array(params)).await?;
        normalize_json(height, &result)
    }

    /// One JSON-RPC round trip. The caller holds the permit and the deadline.
    async fn call(&self, version: &str, height: u64, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = json!({
            "jsonrpc": version,
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(backend = %self.config.name, method, height, "JSON-RPC request");

        let mut request = self.http.post(&self.config.endpoint).json(&envelope);
        if let Some(creds) = auth::resolve(&self.config)? {
            request = request.basic_auth(creds.username, Some(creds.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.guard.timeout()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BackendError::Auth(format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.guard.timeout()))?;

        // Bitcoin Core reports RPC errors with HTTP 500 and a JSON body,
        // so try the envelope before looking at the status.
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => unwrap_envelope(height, body),
            Err(_) if !status.is_success() => Err(BackendError::Connection(format!("HTTP {}", status))),
            Err(e) => Err(BackendError::Malformed(format!("invalid JSON-RPC body: {}", e))),
        }
    }
}

#[async_trait]
impl BackendClient for RpcClient {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// One permit per JSON-RPC request; the timeout bounds the whole
    /// exchange, both Core steps included.
    async fn fetch_one(&self, height: u64) -> Result<TweakSet> {
        self.guard
            .run(async {
                match self.config.method.as_deref() {
                    None => self.fetch_core(height).await,
                    Some(method) => self.fetch_generic(method, height).await,
                }
            })
            .await
    }
}

/// Extract `result` from a JSON-RPC response, classifying `error`.
pub(crate) fn unwrap_envelope(height: u64, mut body: Value) -> Result<Value> {
    match body.get("error") {
        None | Some(Value::Null) => {}
        Some(error) => return Err(classify_rpc_error(height, error)),
    }

    match body.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(BackendError::Malformed("response has neither result nor error".to_string())),
    }
}

/// Map a JSON-RPC error object to a failure kind.
pub(crate) fn classify_rpc_error(height: u64, error: &Value) -> BackendError {
    let code = error.get("code").and_then(Value::as_i64);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());

    let lowered = message.to_lowercase();
    let height_problem = code == Some(RPC_INVALID_PARAMETER)
        || lowered.contains("out of range")
        || lowered.contains("block not found")
        || lowered.contains("unknown block")
        || lowered.contains("beyond");

    if height_problem {
        BackendError::unsupported(height, message)
    } else {
        BackendError::Malformed(format!("RPC error: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_height_error_is_unsupported() {
        let body = json!({
            "result": null,
            "error": {"code": -8, "message": "Block height out of range"},
            "id": 1
        });
        assert!(matches!(
            unwrap_envelope(900_000, body),
            Err(BackendError::UnsupportedHeight { height: 900_000, .. })
        ));
    }

    #[test]
    fn test_other_rpc_errors_are_malformed() {
        let body = json!({"error": {"code": -32601, "message": "Method not found"}, "id": 1});
        assert!(matches!(unwrap_envelope(1, body), Err(BackendError::Malformed(_))));
    }

    #[test]
    fn test_result_extracted() {
        let body = json!({"result": {"bip352_tweaks": ["02aa"]}, "error": null, "id": 1});
        let result = unwrap_envelope(1, body).unwrap();
        assert_eq!(result["bip352_tweaks"][0], "02aa");

        assert!(unwrap_envelope(1, json!({"id": 1})).is_err());
    }

    #[test]
    fn test_dialect_selection() {
        use sp_audit_core::Protocol;
        let core = RpcClient::new(BackendConfig::new("core", Protocol::Rpc, "http://x")).unwrap();
        assert!(core.is_bitcoin_core());

        let mut config = BackendConfig::new("idx", Protocol::Rpc, "http://x");
        config.method = Some("silent_payments_get_tweaks".into());
        assert!(!RpcClient::new(config).unwrap().is_bitcoin_core());
    }
}
