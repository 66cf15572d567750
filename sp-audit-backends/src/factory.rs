//! Client construction from configuration.

use std::sync::Arc;

use sp_audit_core::{BackendConfig, Network, Protocol, ReferenceStore};

use crate::client::BackendClient;
use crate::grpc::GrpcClient;
use crate::http::HttpClient;
use crate::reference::ReferenceClient;
use crate::rpc::RpcClient;
use crate::socket::SocketClient;

/// Build the client for a backend.
///
/// `reference` protocol backends read from `store` under `network`.
///
/// # Errors
///
/// `Config` when the backend's address, headers or target are unusable.
pub fn build_client(
    config: &BackendConfig,
    store: &Arc<dyn ReferenceStore>,
    network: Network,
) -> sp_audit_core::Result<Arc<dyn BackendClient>> {
    let config = config.clone();
    let client: Arc<dyn BackendClient> = match config.protocol {
        Protocol::Http => Arc::new(HttpClient::new(config)?),
        Protocol::Rpc => Arc::new(RpcClient::new(config)?),
        Protocol::SocketRpc => Arc::new(SocketClient::new(config)?),
        Protocol::Grpc => Arc::new(GrpcClient::new(config)?),
        Protocol::Reference => Arc::new(ReferenceClient::new(config, store.clone(), network)),
    };
    Ok(client)
}
