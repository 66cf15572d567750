//! Auditor configuration.
//!
//! Configuration is loaded once per run from JSON (the historical
//! `config.json` layout) or TOML, with the defaults table applied by serde at
//! load time:
//!
//! | field | default |
//! |---|---|
//! | `timeout` | 60 seconds |
//! | `active` | `true` |
//! | `requests_per_second` | 200 |
//!
//! Nothing downstream re-applies defaults; a loaded `BackendConfig` is final.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::network::Network;

/// Name of the virtual backend backed by stored reference data.
pub const REFERENCE_BACKEND: &str = "reference";

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default request budget per backend.
pub const DEFAULT_REQUESTS_PER_SECOND: f64 = 200.0;

/// Default directory for captured reference data.
pub const DEFAULT_REFERENCE_DIR: &str = "reference_data";

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_active() -> bool {
    true
}

fn default_requests_per_second() -> f64 {
    DEFAULT_REQUESTS_PER_SECOND
}

fn default_reference_dir() -> PathBuf {
    PathBuf::from(DEFAULT_REFERENCE_DIR)
}

/// Wire protocol spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Http,
    Rpc,
    SocketRpc,
    Grpc,
    #[serde(alias = "test_data")]
    Reference,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Rpc => "rpc",
            Protocol::SocketRpc => "socket_rpc",
            Protocol::Grpc => "grpc",
            Protocol::Reference => "reference",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP verb used by REST backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Username/password credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Backend-side filtering that changes which outputs a backend reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FilterOptions {
    pub filter_spent: Option<bool>,
    pub dust_limit: Option<u64>,
}

impl fmt::Display for FilterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spent = self
            .filter_spent
            .map(|b| b.to_string())
            .unwrap_or_else(|| "unset".to_string());
        let dust = self
            .dust_limit
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unset".to_string());
        write!(f, "filter_spent={}, dust_limit={}", spent, dust)
    }
}

/// Configuration of one indexer backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,

    #[serde(alias = "service_type")]
    pub protocol: Protocol,

    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub auth: Option<BasicAuth>,

    /// Bitcoin Core style `user:password` cookie file.
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,

    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,

    /// Socket/gRPC host, alternative to `endpoint`.
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: f64,

    #[serde(default)]
    pub filter_spent: Option<bool>,

    #[serde(default)]
    pub dust_limit: Option<u64>,

    /// JSON-RPC method override. Unset selects the Bitcoin Core
    /// `getblockhash` + `getsilentpaymentblockdata` flow for `rpc` and
    /// `blockchain.block.tweaks` for `socket_rpc`.
    #[serde(default)]
    pub method: Option<String>,

    #[serde(default)]
    pub http_method: HttpMethod,
}

impl BackendConfig {
    /// Minimal config for a backend of the given protocol, with the
    /// defaults table applied.
    pub fn new(name: impl Into<String>, protocol: Protocol, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            protocol,
            endpoint: endpoint.into(),
            auth: None,
            cookie_file: None,
            headers: None,
            host: None,
            port: None,
            timeout: DEFAULT_TIMEOUT_SECS,
            active: true,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            filter_spent: None,
            dust_limit: None,
            method: None,
            http_method: HttpMethod::Get,
        }
    }

    /// Config of the virtual reference backend synthesized by the auditor.
    pub fn virtual_reference() -> Self {
        Self::new(REFERENCE_BACKEND, Protocol::Reference, "local")
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            filter_spent: self.filter_spent,
            dust_limit: self.dust_limit,
        }
    }

    /// Resolve `host:port` for socket and gRPC backends.
    ///
    /// Explicit `host` + `port` win; otherwise `endpoint` is parsed as
    /// `[scheme://]host:port[/...]`.
    pub fn socket_address(&self) -> Result<(String, u16)> {
        if let (Some(host), Some(port)) = (&self.host, self.port) {
            return Ok((host.clone(), port));
        }

        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(AuditError::Config(format!(
                "Backend '{}': either 'host' and 'port' or 'endpoint' must be specified",
                self.name
            )));
        }

        let invalid = || {
            AuditError::Config(format!(
                "Backend '{}': invalid endpoint '{}', use 'host:port' format",
                self.name, self.endpoint
            ))
        };

        let without_scheme = endpoint
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(endpoint);
        let authority = without_scheme.split('/').next().unwrap_or_default();
        let (host, port) = authority.rsplit_once(':').ok_or_else(invalid)?;
        let port: u16 = port.parse().map_err(|_| invalid())?;
        if host.is_empty() {
            return Err(invalid());
        }

        Ok((host.to_string(), port))
    }
}

/// A named comparison between two backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSpec {
    pub name: String,

    #[serde(alias = "service1")]
    pub backend1: String,

    #[serde(alias = "service2")]
    pub backend2: String,

    #[serde(default = "default_active")]
    pub active: bool,
}

impl PairSpec {
    pub fn new(name: impl Into<String>, backend1: impl Into<String>, backend2: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend1: backend1.into(),
            backend2: backend2.into(),
            active: true,
        }
    }

    pub fn references_virtual(&self) -> bool {
        self.backend1 == REFERENCE_BACKEND || self.backend2 == REFERENCE_BACKEND
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub network: Network,

    #[serde(default = "default_reference_dir")]
    pub reference_dir: PathBuf,

    #[serde(default)]
    pub suppress_filter_warnings: bool,

    #[serde(default, alias = "services")]
    pub backends: Vec<BackendConfig>,

    #[serde(default, alias = "service_pairs")]
    pub pairs: Vec<PairSpec>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            network: Network::default(),
            reference_dir: default_reference_dir(),
            suppress_filter_warnings: false,
            backends: Vec::new(),
            pairs: Vec::new(),
        }
    }
}

impl AuditConfig {
    /// Load from a file; `.toml` files are parsed as TOML, anything else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let load_err = |reason: String| AuditError::ConfigLoad {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            Self::from_toml_str(&content).map_err(|e| load_err(e.to_string()))
        } else {
            Self::from_json_str(&content).map_err(|e| load_err(e.to_string()))
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| AuditError::Config(e.to_string()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AuditError::Config(e.to_string()))
    }

    pub fn active_backends(&self) -> impl Iterator<Item = &BackendConfig> {
        self.backends.iter().filter(|b| b.active)
    }

    pub fn backend(&self, name: &str) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.name == name)
    }

    pub fn active_pairs(&self) -> impl Iterator<Item = &PairSpec> {
        self.pairs.iter().filter(|p| p.active)
    }

    /// Check the configuration and return every issue found.
    ///
    /// An empty list means the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.backends.is_empty() {
            issues.push("No backends configured".to_string());
            return issues;
        }

        let mut names = HashSet::new();
        for (i, backend) in self.backends.iter().enumerate() {
            if backend.name.trim().is_empty() {
                issues.push(format!("Backend {}: missing name", i));
            } else if !names.insert(backend.name.as_str()) {
                issues.push(format!("Backend {}: duplicate name '{}'", i, backend.name));
            }

            match backend.protocol {
                Protocol::Reference => {}
                Protocol::SocketRpc | Protocol::Grpc => {
                    if let Err(e) = backend.socket_address() {
                        issues.push(e.to_string().replace("Configuration error: ", ""));
                    }
                }
                Protocol::Http | Protocol::Rpc => {
                    if backend.endpoint.trim().is_empty() {
                        issues.push(format!("Backend '{}': missing endpoint", backend.name));
                    }
                }
            }

            if !(backend.requests_per_second.is_finite() && backend.requests_per_second > 0.0) {
                issues.push(format!(
                    "Backend '{}': requests_per_second must be positive",
                    backend.name
                ));
            }

            if backend.timeout == 0 {
                issues.push(format!("Backend '{}': timeout must be at least 1 second", backend.name));
            }
        }

        let mut pair_names = HashSet::new();
        for (i, pair) in self.pairs.iter().enumerate() {
            if !pair.active {
                continue;
            }
            if pair.name.trim().is_empty() {
                issues.push(format!("Pair {}: missing name", i));
            } else if !pair_names.insert(pair.name.as_str()) {
                issues.push(format!("Pair {}: duplicate name '{}'", i, pair.name));
            }

            for (label, side) in [("backend1", &pair.backend1), ("backend2", &pair.backend2)] {
                if side != REFERENCE_BACKEND && !names.contains(side.as_str()) {
                    issues.push(format!(
                        "Pair '{}': {} '{}' not found in backends",
                        pair.name, label, side
                    ));
                }
            }

            if pair.backend1 == pair.backend2 {
                issues.push(format!(
                    "Pair '{}': backend1 and backend2 cannot be the same",
                    pair.name
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_JSON: &str = r#"{
        "services": [
            {
                "name": "bitcoin-core",
                "service_type": "rpc",
                "endpoint": "http://127.0.0.1:8332",
                "cookie_file": "~/.bitcoin/.cookie",
                "filter_spent": false
            },
            {
                "name": "blindbit-oracle",
                "service_type": "http",
                "endpoint": "http://127.0.0.1:8000/tweak-index",
                "headers": {"User-Agent": "TweakServiceAuditor/1.0"},
                "timeout": 30,
                "dust_limit": 546
            }
        ],
        "service_pairs": [
            {"name": "core-vs-oracle", "service1": "bitcoin-core", "service2": "blindbit-oracle"}
        ]
    }"#;

    #[test]
    fn test_defaults_applied_at_load() {
        let config = AuditConfig::from_json_str(LEGACY_JSON).unwrap();
        let core = config.backend("bitcoin-core").unwrap();

        assert_eq!(core.timeout, DEFAULT_TIMEOUT_SECS);
        assert!(core.active);
        assert_eq!(core.requests_per_second, DEFAULT_REQUESTS_PER_SECOND);
        assert_eq!(core.http_method, HttpMethod::Get);

        let oracle = config.backend("blindbit-oracle").unwrap();
        assert_eq!(oracle.timeout, 30);
        assert_eq!(oracle.dust_limit, Some(546));

        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.reference_dir, PathBuf::from(DEFAULT_REFERENCE_DIR));
        assert!(config.pairs[0].active);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_toml_layout() {
        let toml = r#"
            network = "signet"
            suppress_filter_warnings = true

            [[backends]]
            name = "electrs"
            protocol = "socket_rpc"
            endpoint = "tcp://127.0.0.1:60601"
            requests_per_second = 5

            [[backends]]
            name = "oracle-grpc"
            protocol = "grpc"
            host = "localhost"
            port = 50051

            [[pairs]]
            name = "electrs-vs-ref"
            backend1 = "electrs"
            backend2 = "reference"
        "#;
        let config = AuditConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.network, Network::Signet);
        assert!(config.suppress_filter_warnings);
        assert_eq!(config.backends[0].requests_per_second, 5.0);
        assert!(config.pairs[0].references_virtual());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_socket_address_formats() {
        let cases = [
            ("127.0.0.1:50051", "127.0.0.1", 50051),
            ("grpc://localhost:9000", "localhost", 9000),
            ("blindbit.example.com:443", "blindbit.example.com", 443),
            ("http://10.0.0.2:8080/path", "10.0.0.2", 8080),
        ];
        for (endpoint, host, port) in cases {
            let cfg = BackendConfig::new("x", Protocol::Grpc, endpoint);
            assert_eq!(cfg.socket_address().unwrap(), (host.to_string(), port));
        }

        let missing_port = BackendConfig::new("x", Protocol::SocketRpc, "localhost");
        assert!(missing_port.socket_address().is_err());

        let mut explicit = BackendConfig::new("x", Protocol::SocketRpc, "");
        explicit.host = Some("electrs.local".into());
        explicit.port = Some(50001);
        assert_eq!(explicit.socket_address().unwrap(), ("electrs.local".to_string(), 50001));
    }

    #[test]
    fn test_validate_reports_all_issues() {
        let mut dup = BackendConfig::new("a", Protocol::Http, "");
        dup.requests_per_second = 0.0;
        let config = AuditConfig {
            backends: vec![
                BackendConfig::new("a", Protocol::Http, "http://x"),
                dup,
                BackendConfig::new("s", Protocol::SocketRpc, "nope"),
            ],
            pairs: vec![
                PairSpec::new("p", "a", "ghost"),
                PairSpec::new("p", "a", "a"),
            ],
            ..AuditConfig::default()
        };

        let issues = config.validate();
        assert!(issues.iter().any(|i| i.contains("duplicate name 'a'")));
        assert!(issues.iter().any(|i| i.contains("missing endpoint")));
        assert!(issues.iter().any(|i| i.contains("requests_per_second")));
        assert!(issues.iter().any(|i| i.contains("invalid endpoint 'nope'")));
        assert!(issues.iter().any(|i| i.contains("'ghost' not found")));
        assert!(issues.iter().any(|i| i.contains("cannot be the same")));
        assert!(issues.iter().any(|i| i.contains("duplicate name 'p'")));
    }

    #[test]
    fn test_reference_pair_is_not_an_issue() {
        let config = AuditConfig {
            backends: vec![BackendConfig::new("a", Protocol::Http, "http://x")],
            pairs: vec![PairSpec::new("a-vs-ref", "a", REFERENCE_BACKEND)],
            ..AuditConfig::default()
        };
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_empty_config_issue() {
        assert_eq!(AuditConfig::default().validate(), vec!["No backends configured".to_string()]);
    }
}
