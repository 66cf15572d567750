//! REST backend client (BlindBit oracle style tweak index).

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde_json::{json, Value};
use sp_audit_core::config::HttpMethod;
use sp_audit_core::{AuditError, BackendConfig, TweakSet};
use tracing::debug;

use crate::auth;
use crate::client::{BackendClient, CallGuard};
use crate::error::{BackendError, Result};
use crate::normalize::normalize_json;

/// Placeholder substituted with the block height in endpoint templates.
pub const HEIGHT_PLACEHOLDER: &str = "{height}";

/// Fetches one block per HTTP request.
///
/// The URL is `endpoint` with `{height}` substituted, or `endpoint/<height>`
/// when no placeholder is present. `dust_limit` is sent as a query parameter
/// on GET and in the JSON body on POST.
#[derive(Debug)]
pub struct HttpClient {
    config: BackendConfig,
    http: reqwest::Client,
    guard: CallGuard,
}

impl HttpClient {
    pub fn new(config: BackendConfig) -> sp_audit_core::Result<Self> {
        let http = build_http(&config)?;
        let guard = CallGuard::new(&config);
        Ok(Self { config, http, guard })
    }

    /// URL requested for a height, without query parameters.
    pub fn url_for(&self, height: u64) -> String {
        let endpoint = self.config.endpoint.trim();
        if endpoint.contains(HEIGHT_PLACEHOLDER) {
            endpoint.replace(HEIGHT_PLACEHOLDER, &height.to_string())
        } else {
            format!("{}/{}", endpoint.trim_end_matches('/'), height)
        }
    }

    async fn request(&self, height: u64) -> Result<TweakSet> {
        let url = self.url_for(height);
        debug!(backend = %self.config.name, %url, "HTTP request");

        let mut request = match self.config.http_method {
            HttpMethod::Get => {
                let mut req = self.http.get(&url);
                if let Some(dust) = self.config.dust_limit {
                    req = req.query(&[("dust_limit", dust)]);
                }
                req
            }
            HttpMethod::Post => {
                let mut body = json!({ "block_height": height });
                if let Some(spent) = self.config.filter_spent {
                    body["filter_spent"] = json!(spent);
                }
                if let Some(dust) = self.config.dust_limit {
                    body["dust_limit"] = json!(dust);
                }
                self.http.post(&url).json(&body)
            }
        };

        if let Some(creds) = auth::resolve(&self.config)? {
            request = request.basic_auth(creds.username, Some(creds.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.guard.timeout()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(height, status));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.guard.timeout()))?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::Malformed(format!("invalid JSON body: {}", e)))?;

        normalize_json(height, &value)
    }
}

#[async_trait]
impl BackendClient for HttpClient {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn fetch_one(&self, height: u64) -> Result<TweakSet> {
        self.guard.run(self.request(height)).await
    }
}

/// Shared `reqwest` client carrying the configured default headers.
pub(crate) fn build_http(config: &BackendConfig) -> sp_audit_core::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(custom) = &config.headers {
        for (name, value) in custom {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                AuditError::Config(format!("Backend '{}': invalid header name '{}': {}", config.name, name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                AuditError::Config(format!("Backend '{}': invalid header value: {}", config.name, e))
            })?;
            headers.insert(name, value);
        }
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| AuditError::Config(format!("Backend '{}': {}", config.name, e)))
}

fn status_error(height: u64, status: StatusCode) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            BackendError::Auth(format!("HTTP {}", status))
        }
        StatusCode::NOT_FOUND => BackendError::unsupported(height, format!("HTTP {}", status)),
        _ => BackendError::Connection(format!("HTTP {}", status)),
    }
}
