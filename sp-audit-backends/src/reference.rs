//! Reference-data pseudo-backend.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use sp_audit_core::{AuditError, BackendConfig, Network, ReferenceStore, TweakSet};

use crate::client::{BackendClient, HeightStream};
use crate::error::{BackendError, Result};

/// Serves previously captured sets from a [`ReferenceStore`]. No network I/O
/// and no rate limit.
pub struct ReferenceClient {
    config: BackendConfig,
    store: Arc<dyn ReferenceStore>,
    network: Network,
}

impl ReferenceClient {
    pub fn new(config: BackendConfig, store: Arc<dyn ReferenceStore>, network: Network) -> Self {
        Self {
            config,
            store,
            network,
        }
    }

    /// Client for the virtual `reference` backend.
    pub fn virtual_backend(store: Arc<dyn ReferenceStore>, network: Network) -> Self {
        Self::new(BackendConfig::virtual_reference(), store, network)
    }

    /// Stored set for a height, distinguishing "not captured" from store
    /// errors.
    pub async fn load(&self, height: u64) -> sp_audit_core::Result<Option<TweakSet>> {
        let store = self.store.clone();
        let network = self.network;
        blocking(move || store.load(network, height)).await
    }

    async fn heights(&self, start: u64, end: u64) -> sp_audit_core::Result<Vec<u64>> {
        let store = self.store.clone();
        let network = self.network;
        blocking(move || store.heights(network, start, end)).await
    }
}

/// Write a captured set without stalling the runtime.
pub(crate) async fn store_set(
    store: &Arc<dyn ReferenceStore>,
    network: Network,
    height: u64,
    source: &str,
    tweaks: TweakSet,
) -> sp_audit_core::Result<()> {
    let store = store.clone();
    let source = source.to_string();
    blocking(move || store.store(network, height, &source, &tweaks)).await
}

/// Run a store operation on the blocking pool; file stores do plain
/// `std::fs` I/O.
async fn blocking<T, F>(op: F) -> sp_audit_core::Result<T>
where
    F: FnOnce() -> sp_audit_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| AuditError::ReferenceStore(format!("store task failed: {}", e)))?
}

#[async_trait]
impl BackendClient for ReferenceClient {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn fetch_one(&self, height: u64) -> Result<TweakSet> {
        match self.load(height).await {
            Ok(Some(set)) => Ok(set),
            Ok(None) => Err(BackendError::unsupported(height, "no reference data captured")),
            Err(e) => Err(BackendError::Malformed(e.to_string())),
        }
    }

    /// Only heights present in the store are yielded. When the store cannot
    /// be listed, every height of the range carries the error.
    fn fetch_range(&self, start: u64, end: u64) -> HeightStream<'_> {
        stream::once(self.heights(start, end))
            .flat_map(move |listed| match listed {
                Ok(heights) => stream::iter(heights)
                    .then(move |height| async move { (height, self.fetch_one(height).await) })
                    .boxed(),
                Err(e) => {
                    tracing::warn!(error = %e, "cannot list reference heights");
                    let err = BackendError::from(e);
                    stream::iter((start..=end).map(move |height| (height, Err(err.clone())))).boxed()
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_audit_core::{MemoryReferenceStore, TweakRecord};

    fn store_with(heights: &[u64]) -> Arc<dyn ReferenceStore> {
        let store = MemoryReferenceStore::new();
        for h in heights {
            let set: TweakSet = [TweakRecord::new(*h, None, "02aa").unwrap()].into_iter().collect();
            store.store(Network::Mainnet, *h, "core", &set).unwrap();
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_missing_height_is_unsupported() {
        let client = ReferenceClient::virtual_backend(store_with(&[1]), Network::Mainnet);
        assert_eq!(client.name(), "reference");
        assert_eq!(client.fetch_one(1).await.unwrap().len(), 1);
        assert!(matches!(
            client.fetch_one(2).await,
            Err(BackendError::UnsupportedHeight { height: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_range_yields_stored_heights_only() {
        let client = ReferenceClient::virtual_backend(store_with(&[3, 5, 9]), Network::Mainnet);
        let heights: Vec<u64> = client.fetch_range(2, 6).map(|(h, _)| h).collect().await;
        assert_eq!(heights, vec![3, 5]);
    }

    struct Unreadable;

    impl ReferenceStore for Unreadable {
        fn load(&self, _network: Network, _height: u64) -> sp_audit_core::Result<Option<TweakSet>> {
            Err(AuditError::ReferenceStore("permission denied".into()))
        }

        fn store(&self, _: Network, _: u64, _: &str, _: &TweakSet) -> sp_audit_core::Result<()> {
            Err(AuditError::ReferenceStore("read-only".into()))
        }

        fn heights(&self, _: Network, _: u64, _: u64) -> sp_audit_core::Result<Vec<u64>> {
            Err(AuditError::ReferenceStore("permission denied".into()))
        }
    }

    #[tokio::test]
    async fn test_unlistable_store_fails_every_height() {
        let client = ReferenceClient::virtual_backend(Arc::new(Unreadable), Network::Mainnet);
        let out: Vec<_> = client.fetch_range(4, 6).collect().await;
        let heights: Vec<u64> = out.iter().map(|(h, _)| *h).collect();
        assert_eq!(heights, vec![4, 5, 6]);
        for (_, result) in &out {
            let err = result.as_ref().unwrap_err();
            assert!(err.to_string().contains("permission denied"));
        }
    }

    #[tokio::test]
    async fn test_store_set_round_trip() {
        let store = store_with(&[]);
        let set: TweakSet = [TweakRecord::new(8, None, "03bb").unwrap()].into_iter().collect();
        store_set(&store, Network::Signet, 8, "core", set.clone()).await.unwrap();

        let client = ReferenceClient::virtual_backend(store, Network::Signet);
        assert_eq!(client.load(8).await.unwrap(), Some(set));
    }
}
