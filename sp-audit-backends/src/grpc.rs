//! Streaming gRPC client for the BlindBit oracle.
//!
//! A range is served by one `StreamBlockBatchSlim` server-streaming call.
//! The incoming per-block batches are demultiplexed into the height-indexed
//! [`HeightStream`] shared with polled backends.
//!
//! Messages are declared by hand with `prost` derives:
//!
//! ```text
//! rpc StreamBlockBatchSlim(RangedBlockHeightRequest) returns (stream BlockBatchSlim);
//!
//! message RangedBlockHeightRequest { uint64 start = 1; uint64 end = 2; uint64 dust_limit = 3; }
//! message BlockIdentifier { bytes block_hash = 1; uint64 block_height = 2; }
//! message BlockBatchSlim { BlockIdentifier block_identifier = 1; repeated bytes tweaks = 2; }
//! ```

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use http::uri::PathAndQuery;
use sp_audit_core::{AuditError, BackendConfig, TweakRecord, TweakSet};
use tokio::sync::Mutex;
use tonic::codec::ProstCodec;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::{debug, warn};

use crate::client::{BackendClient, CallGuard, HeightStream};
use crate::error::{BackendError, Result};

/// Full method path of the range stream.
pub const STREAM_BLOCK_BATCH_SLIM: &str = "/blindbit.oracle.v1.OracleService/StreamBlockBatchSlim";

#[derive(Clone, PartialEq, prost::Message)]
pub struct RangedBlockHeightRequest {
    #[prost(uint64, tag = "1")]
    pub start: u64,
    #[prost(uint64, tag = "2")]
    pub end: u64,
    #[prost(uint64, tag = "3")]
    pub dust_limit: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BlockIdentifier {
    #[prost(bytes = "vec", tag = "1")]
    pub block_hash: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub block_height: u64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct BlockBatchSlim {
    #[prost(message, optional, tag = "1")]
    pub block_identifier: Option<BlockIdentifier>,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub tweaks: Vec<Vec<u8>>,
}

impl BlockBatchSlim {
    pub fn height(&self) -> Option<u64> {
        self.block_identifier.as_ref().map(|id| id.block_height)
    }

    /// Hex-encode the raw tweak bytes into records.
    pub fn into_tweak_set(self, height: u64) -> Result<TweakSet> {
        self.tweaks
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| TweakRecord::from_bytes(height, t).map_err(BackendError::from))
            .collect()
    }
}

/// Map a gRPC status to a failure kind.
pub fn status_error(height: u64, status: &Status) -> BackendError {
    let message = format!("gRPC {:?}: {}", status.code(), status.message());
    match status.code() {
        Code::Unavailable => BackendError::Connection(message),
        Code::DeadlineExceeded => BackendError::Timeout(Duration::ZERO),
        Code::Unauthenticated | Code::PermissionDenied => BackendError::Auth(message),
        Code::NotFound | Code::OutOfRange => BackendError::unsupported(height, message),
        _ => BackendError::Malformed(message),
    }
}

/// Streaming gRPC client.
pub struct GrpcClient {
    config: BackendConfig,
    endpoint: Endpoint,
    guard: CallGuard,
    channel: Mutex<Option<Channel>>,
}

impl GrpcClient {
    pub fn new(config: BackendConfig) -> sp_audit_core::Result<Self> {
        let (host, port) = config.socket_address()?;
        let endpoint = Endpoint::from_shared(format!("http://{}:{}", host, port))
            .map_err(|e| AuditError::Config(format!("Backend '{}': invalid gRPC target: {}", config.name, e)))?
            .connect_timeout(config.timeout_duration());
        let guard = CallGuard::new(&config);

        Ok(Self {
            config,
            endpoint,
            guard,
            channel: Mutex::new(None),
        })
    }

    async fn channel(&self) -> Result<Channel> {
        let mut slot = self.channel.lock().await;
        if let Some(channel) = slot.as_ref() {
            return Ok(channel.clone());
        }

        debug!(backend = %self.config.name, uri = %self.endpoint.uri(), "connecting gRPC channel");
        let channel = self
            .endpoint
            .connect()
            .await
            .map_err(|e| BackendError::Connection(format!("gRPC connect failed: {}", e)))?;
        *slot = Some(channel.clone());
        Ok(channel)
    }

    async fn open_stream(&self, start: u64, end: u64) -> Result<tonic::Streaming<BlockBatchSlim>> {
        let channel = self.channel().await?;
        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready().await.map_err(|e| {
            BackendError::Connection(format!("gRPC service not ready: {}", e))
        })?;

        let request = tonic::Request::new(RangedBlockHeightRequest {
            start,
            end,
            dust_limit: self.config.dust_limit.unwrap_or(0),
        });
        let codec: ProstCodec<RangedBlockHeightRequest, BlockBatchSlim> = ProstCodec::default();
        let path = PathAndQuery::from_static(STREAM_BLOCK_BATCH_SLIM);

        match grpc.server_streaming(request, path, codec).await {
            Ok(response) => Ok(response.into_inner()),
            Err(status) => {
                if status.code() == Code::Unavailable {
                    // force a fresh channel on the next call
                    self.channel.lock().await.take();
                }
                Err(status_error(start, &status))
            }
        }
    }
}

#[async_trait]
impl BackendClient for GrpcClient {
    fn config(&self) -> &BackendConfig {
        &self.config
    }

    async fn fetch_one(&self, height: u64) -> Result<TweakSet> {
        match self.fetch_range(height, height).next().await {
            Some((_, result)) => result,
            None => Err(BackendError::Malformed("empty result stream".to_string())),
        }
    }

    fn fetch_range(&self, start: u64, end: u64) -> HeightStream<'_> {
        let timeout = self.guard.timeout();
        let name = self.config.name.clone();
        let open = async move {
            self.guard.permit().await;
            self.guard.bounded(self.open_stream(start, end)).await
        };

        stream::once(open)
            .flat_map(move |opened| match opened {
                Ok(batches) => demux(start, end, batches, timeout).boxed(),
                Err(e) => {
                    warn!(backend = %name, error = %e, "gRPC stream failed to open");
                    stream::iter((start..=end).map(move |h| (h, Err(e.clone())))).boxed()
                }
            })
            .boxed()
    }
}

struct Demux<S> {
    next: u64,
    end: u64,
    done: bool,
    source: Pin<Box<S>>,
    pending: Option<(u64, Result<TweakSet>)>,
    terminal: Option<BackendError>,
    timeout: Duration,
}

impl<S> Demux<S> {
    /// Move the cursor past the height just emitted.
    fn advance(&mut self) {
        match self.next.checked_add(1) {
            Some(next) if next <= self.end => self.next = next,
            _ => self.done = true,
        }
    }
}

/// Turn a stream of per-block batches into one result per height of
/// `[start, end]`.
///
/// Heights the server skips yield `UnsupportedHeight`. A stream error, a
/// clean early end or a receive timeout fails every remaining height.
/// Batches outside the range or behind the cursor are ignored.
pub fn demux<S>(start: u64, end: u64, source: S, timeout: Duration) -> impl Stream<Item = (u64, Result<TweakSet>)> + Send
where
    S: Stream<Item = std::result::Result<BlockBatchSlim, Status>> + Send + 'static,
{
    let state = Demux {
        next: start,
        end,
        done: start > end,
        source: Box::pin(source),
        pending: None,
        terminal: None,
        timeout,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.done {
                return None;
            }
            let height = st.next;

            if let Some(err) = st.terminal.clone() {
                st.advance();
                return Some(((height, Err(err)), st));
            }

            match st.pending.as_ref().map(|(h, _)| *h) {
                Some(pending_height) if pending_height == height => {
                    let result = st.pending.take().map(|(_, result)| result);
                    st.advance();
                    return result.map(|result| ((height, result), st));
                }
                Some(_) => {
                    st.advance();
                    let gap = BackendError::unsupported(height, "height skipped by server stream");
                    return Some(((height, Err(gap)), st));
                }
                None => {}
            }

            match tokio::time::timeout(st.timeout, st.source.next()).await {
                Ok(Some(Ok(batch))) => match batch.height() {
                    Some(h) if h >= height && h <= st.end => {
                        let result = batch.into_tweak_set(h);
                        st.pending = Some((h, result));
                    }
                    other => debug!(batch_height = ?other, expected = height, "ignoring out-of-order batch"),
                },
                Ok(Some(Err(status))) => st.terminal = Some(status_error(height, &status)),
                Ok(None) => {
                    st.terminal = Some(BackendError::unsupported(height, "server stream ended early"))
                }
                Err(_) => st.terminal = Some(BackendError::Timeout(st.timeout)),
            }
        }
    })
}
