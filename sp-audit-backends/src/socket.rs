//! Raw TCP JSON-RPC client (Electrum protocol, as served by electrs /
//! esplora-cake).
//!
//! Requests and responses are newline-delimited JSON objects. One connection
//! is kept open and reused; any I/O or framing error drops it and the next
//! call reconnects.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};
use sp_audit_core::{BackendConfig, TweakSet};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::client::{BackendClient, CallGuard};
use crate::error::{BackendError, Result};
use crate::normalize::normalize_json;
use crate::rpc::unwrap_envelope;

/// Default Electrum method returning a block's tweaks.
pub const DEFAULT_SOCKET_METHOD: &str = "blockchain.block.tweaks";

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| BackendError::Connection(format!("connect to {}:{} failed: {}", host, port, e)))?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer: write,
        })
    }

    async fn exchange(&mut self, request: &Value) -> Result<Value> {
        let mut line = request.to_string();
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BackendError::Connection(format!("write failed: {}", e)))?;

        let mut response = String::new();
        let read = self
            .reader
            .read_line(&mut response)
            .await
            .map_err(|e| BackendError::Connection(format!("read failed: {}", e)))?;
        if read == 0 {
            return Err(BackendError::Connection("connection closed by peer".to_string()));
        }

        serde_json::from_str(response.trim_end())
            .map_err(|e| BackendError::Malformed(format!("invalid JSON line: {}", e)))
    }
}

/// Socket JSON-RPC client.
pub struct SocketClient {
    config: BackendConfig,
    host: String,
    port: u16,
    guard: CallGuard,
    conn: Mutex<Option<Connection>>,
    next_id: AtomicU64,
}

impl SocketClient {
    pub fn new(config: BackendConfig) -> sp_audit_core::Result<Self> {
        let (host, port) = config.socket_address()?;
        let guard = CallGuard::new(&config);
        Ok(Self {
            config,
            host,
            port,
            guard,
            conn: Mutex::new(None),
            next_id: AtomicU64::new(0),
        })
    }

    pub fn address(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    fn method(&self) -> &str {
        self.config.method.as_deref().unwrap_or(DEFAULT_SOCKET_METHOD)
    }

    async fn call(&self, slot: &mut Option<Connection>, height: u64) -> Result<Value> {
        if slot.is_none() {
            debug!(backend = %self.config.name, host = %self.host, port = self.port, "opening socket connection");
            *slot = Some(Connection::open(&self.host, self.port).await?);
        }
        let conn = slot
            .as_mut()
            .ok_or_else(|| BackendError::Connection("connection unavailable".to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut params = vec![json!(height)];
        if let Some(dust) = self.config.dust_limit {
            params.push(json!(dust));
        }
        let request = json!({ "id": id, "method": self.method(), "params": params });

        let response = conn.exchange(&request).await?;
        if response.get("id").and_then(Value::as_u64) != Some(id) {
            return Err(BackendError::Malformed(format!(
                "response id {} does not match request id {}",
                response.get("id").unwrap_or(&Value::Null),
                id
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl BackendClient for SocketClient {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn fetch_one(&self, height: u64) -> Result<TweakSet> {
        self.guard.permit().await;
        let mut slot = self.conn.lock().await;

        let response = match self.guard.bounded(self.call(&mut *slot, height)).await {
            Ok(response) => response,
            Err(e) => {
                // The stream may hold a partial or late reply; start fresh.
                if slot.take().is_some() {
                    warn!(backend = %self.config.name, error = %e, "dropping socket connection");
                }
                return Err(e);
            }
        };
        drop(slot);

        let result = unwrap_envelope(height, response)?;
        normalize_json(height, &result)
    }
}
