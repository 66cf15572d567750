//! The backend client capability.
//!
//! Every protocol implements [`BackendClient`]; callers hold
//! `Arc<dyn BackendClient>` and never match on the protocol.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sp_audit_core::{BackendConfig, TweakSet};

use crate::error::{BackendError, Result};
use crate::rate_limit::RateLimiter;

/// Lazy, finite, ascending sequence of per-height results.
pub type HeightStream<'a> = BoxStream<'a, (u64, Result<TweakSet>)>;

/// A source of normalized tweak sets.
#[async_trait]
pub trait BackendClient: Send + Sync {
    fn config(&self) -> &BackendConfig;

    fn name(&self) -> &str {
        &self.config().name
    }

    /// Fetch and normalize the tweaks of one block.
    async fn fetch_one(&self, height: u64) -> Result<TweakSet>;

    /// Results for every height in `[start, end]`, in ascending order.
    ///
    /// The default polls [`fetch_one`](Self::fetch_one) height by height;
    /// streaming protocols override it.
    fn fetch_range(&self, start: u64, end: u64) -> HeightStream<'_> {
        stream::iter(start..=end)
            .then(move |height| async move { (height, self.fetch_one(height).await) })
            .boxed()
    }
}

/// Rate limit and timeout applied to every network call of a client.
#[derive(Debug)]
pub struct CallGuard {
    limiter: RateLimiter,
    timeout: Duration,
}

impl CallGuard {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.requests_per_second),
            timeout: config.timeout_duration(),
        }
    }

    /// Wait for a permit, then run `call` bounded by the timeout.
    pub async fn run<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.limiter.acquire().await;
        self.bounded(call).await
    }

    /// Run `call` bounded by the timeout, without taking a permit.
    pub async fn bounded<F, T>(&self, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout)),
        }
    }

    /// Take a permit without running anything.
    pub async fn permit(&self) {
        self.limiter.acquire().await;
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}
