//! The auditor: concurrent queries, failure isolation, comparison.
//!
//! Per height, every active backend is queried concurrently and the results
//! are joined before comparison. A backend failure is recorded and never
//! affects the other backends or later heights.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use futures::stream::{Peekable, StreamExt};
use sp_audit_core::comparison::{resolve_pairs, ResolvedPair};
use sp_audit_core::{
    AuditConfig, AuditError, AuditResult, BackendOutcome, CaptureReport, Protocol,
    RangeAuditResult, ReferenceStore, TweakSet, REFERENCE_BACKEND,
};
use tracing::{debug, info, warn};

use crate::client::{BackendClient, HeightStream};
use crate::error::{BackendError, Result};
use crate::factory::build_client;
use crate::reference::{store_set, ReferenceClient};

/// Cooperative stop signal for range audits and captures.
///
/// Heights already dispatched complete; no new height is started.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Orchestrates audits across all active backends.
pub struct Auditor {
    config: AuditConfig,
    clients: Vec<Arc<dyn BackendClient>>,
    pairs: Vec<ResolvedPair>,
    store: Arc<dyn ReferenceStore>,
    virtual_reference: Option<ReferenceClient>,
    stop: StopHandle,
}

impl Auditor {
    /// Build one client per active backend and resolve the pairs.
    ///
    /// # Errors
    ///
    /// Configuration errors: no active backend, a pair naming an unknown
    /// backend, or a backend whose client cannot be built.
    pub fn new(config: AuditConfig, store: Arc<dyn ReferenceStore>) -> sp_audit_core::Result<Self> {
        let clients = config
            .active_backends()
            .map(|backend| build_client(backend, &store, config.network))
            .collect::<sp_audit_core::Result<Vec<_>>>()?;
        Self::with_clients(config, clients, store)
    }

    /// Build an auditor over pre-built clients.
    pub fn with_clients(
        config: AuditConfig,
        clients: Vec<Arc<dyn BackendClient>>,
        store: Arc<dyn ReferenceStore>,
    ) -> sp_audit_core::Result<Self> {
        if clients.is_empty() {
            return Err(AuditError::NoActiveBackends);
        }

        let resolution = resolve_pairs(&config)?;
        for name in &resolution.inactive {
            warn!(pair = %name, "pair skipped: references an inactive backend");
        }
        for pair in &resolution.pairs {
            if let Some(warning) = &pair.filter_warning {
                warn!(pair = %pair.spec.name, "{}", warning);
            }
        }

        let virtual_reference = resolution
            .needs_virtual_reference()
            .then(|| ReferenceClient::virtual_backend(store.clone(), config.network));

        info!(
            backends = clients.len(),
            pairs = resolution.pairs.len(),
            network = %config.network,
            "auditor ready"
        );

        Ok(Self {
            config,
            clients,
            pairs: resolution.pairs,
            store,
            virtual_reference,
            stop: StopHandle::new(),
        })
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn clients(&self) -> &[Arc<dyn BackendClient>] {
        &self.clients
    }

    pub fn pairs(&self) -> &[ResolvedPair] {
        &self.pairs
    }

    /// Handle that stops a running range audit or capture.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Audit a single height.
    pub async fn audit_one(&self, height: u64) -> AuditResult {
        info!(height, backends = self.clients.len(), "auditing block");

        let fetches = self.clients.iter().map(|client| timed_fetch(client.as_ref(), height));
        let mut outcomes = join_all(fetches).await;
        log_failures(&outcomes);

        let warnings = self.add_reference(height, &mut outcomes).await;
        AuditResult::assemble(height, outcomes, &self.pairs, warnings)
    }

    /// Append the virtual reference set for `height`, if any. A store error
    /// becomes a warning and the reference pairs are skipped.
    async fn add_reference(&self, height: u64, outcomes: &mut Vec<BackendOutcome>) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(reference) = &self.virtual_reference {
            match reference.load(height).await {
                Ok(Some(set)) => outcomes.push(BackendOutcome::success(
                    REFERENCE_BACKEND,
                    height,
                    set,
                    std::time::Duration::ZERO,
                )),
                Ok(None) => debug!(height, "no reference data captured"),
                Err(e) => warnings.push(reference_warning(height, &e.to_string())),
            }
        }
        warnings
    }

    /// Audit every height of `[start, end]` in ascending order.
    ///
    /// Each backend's range stream is opened once and all streams advance
    /// together, one height at a time.
    ///
    /// # Errors
    ///
    /// `Config` when `start > end`.
    pub async fn audit_range(&self, start: u64, end: u64) -> sp_audit_core::Result<RangeAuditResult> {
        if start > end {
            return Err(AuditError::Config(format!(
                "start block {} is after end block {}",
                start, end
            )));
        }
        info!(start, end, backends = self.clients.len(), "auditing range");

        let mut streams: Vec<(&str, Peekable<HeightStream<'_>>)> = self
            .clients
            .iter()
            .map(|client| (client.name(), client.fetch_range(start, end).peekable()))
            .collect();

        let mut range = RangeAuditResult::new(start, end);

        for height in start..=end {
            if self.stop.is_stopped() {
                info!(height, "stop requested, ending range early");
                range.stopped_early = true;
                break;
            }

            let fetches = streams.iter_mut().map(|(name, stream)| {
                let name: &str = name;
                async move {
                    let started = Instant::now();
                    let result = take_height(stream, height).await.unwrap_or_else(|| {
                        Err(BackendError::unsupported(height, "backend returned no result for this height"))
                    });
                    outcome(name, height, result, started)
                }
            });
            let mut outcomes = join_all(fetches).await;
            log_failures(&outcomes);

            let warnings = self.add_reference(height, &mut outcomes).await;
            let result = AuditResult::assemble(height, outcomes, &self.pairs, warnings);
            debug!(
                height,
                matching = result.matching_count,
                failures = result.failures.len(),
                "block audited"
            );
            range.fold(result);
        }

        info!(
            blocks = range.blocks_audited,
            stopped_early = range.stopped_early,
            "range audit finished"
        );
        Ok(range)
    }

    /// Capture `[start, end]` from a configured backend into the reference
    /// store.
    ///
    /// # Errors
    ///
    /// `Config` for the reference backend itself, an unknown backend or an
    /// inverted range; `ReferenceStore` when a write fails.
    pub async fn capture_reference(
        &self,
        backend: &str,
        start: u64,
        end: u64,
    ) -> sp_audit_core::Result<CaptureReport> {
        if start > end {
            return Err(AuditError::Config(format!(
                "start block {} is after end block {}",
                start, end
            )));
        }

        let config = self.config.backend(backend);
        let is_reference = match config {
            Some(cfg) => cfg.protocol == Protocol::Reference,
            None => backend == REFERENCE_BACKEND,
        };
        if is_reference {
            return Err(AuditError::Config(
                "cannot capture reference data from the reference backend itself".to_string(),
            ));
        }

        let client = match self.clients.iter().find(|c| c.name() == backend) {
            Some(client) => client.clone(),
            None => match config {
                // inactive backends may still be captured from
                Some(cfg) => build_client(cfg, &self.store, self.config.network)?,
                None => {
                    return Err(AuditError::Config(format!("Unknown backend '{}'", backend)));
                }
            },
        };

        info!(backend, start, end, network = %self.config.network, "capturing reference data");
        let mut report = CaptureReport::new(backend, self.config.network, start, end);
        let mut stream = client.fetch_range(start, end).peekable();

        for height in start..=end {
            if self.stop.is_stopped() {
                info!(height, "stop requested, ending capture early");
                break;
            }

            match take_height(&mut stream, height).await {
                Some(Ok(set)) => {
                    let tweaks = set.len();
                    store_set(&self.store, self.config.network, height, backend, set).await?;
                    debug!(height, tweaks, "reference block stored");
                    report.stored.push(height);
                }
                Some(Err(e)) => {
                    warn!(backend, height, error = %e, "capture failed");
                    report.failed.insert(height, e.into());
                }
                None => {
                    let e = BackendError::unsupported(height, "backend returned no result for this height");
                    report.failed.insert(height, e.into());
                }
            }
        }

        Ok(report)
    }
}

async fn timed_fetch(client: &dyn BackendClient, height: u64) -> BackendOutcome {
    let started = Instant::now();
    let result = client.fetch_one(height).await;
    outcome(client.name(), height, result, started)
}

fn outcome(name: &str, height: u64, result: Result<TweakSet>, started: Instant) -> BackendOutcome {
    let elapsed = started.elapsed();
    match result {
        Ok(set) => {
            debug!(backend = name, height, tweaks = set.len(), elapsed_ms = elapsed.as_millis() as u64, "backend ok");
            BackendOutcome::success(name, height, set, elapsed)
        }
        Err(e) => BackendOutcome::failure(name, height, e.into(), elapsed),
    }
}

/// Pull the result for `height` from a height-ordered stream.
///
/// Entries below `height` are discarded; `None` when the stream has no entry
/// for it.
async fn take_height(stream: &mut Peekable<HeightStream<'_>>, height: u64) -> Option<Result<TweakSet>> {
    let mut stream = Pin::new(stream);
    loop {
        let next = stream.as_mut().peek().await.map(|(h, _)| *h);
        match next {
            Some(h) if h < height => {
                stream.as_mut().next().await;
            }
            Some(h) if h == height => return stream.as_mut().next().await.map(|(_, result)| result),
            _ => return None,
        }
    }
}

fn log_failures(outcomes: &[BackendOutcome]) {
    for outcome in outcomes {
        if let Err(failure) = &outcome.result {
            warn!(
                backend = %outcome.backend_name,
                height = outcome.block_height,
                kind = %failure.kind,
                "{}",
                failure.message
            );
        }
    }
}

fn reference_warning(height: u64, reason: &str) -> String {
    warn!(height, reason, "reference data unavailable");
    format!("Reference data unavailable at height {}: {}", height, reason)
}
