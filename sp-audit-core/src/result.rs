//! Audit result structures.
//!
//! Field names are stable: results are serialized verbatim for external
//! consumers. Record sets are kept in memory and only serialized in detailed
//! mode (see [`AuditResult::strip_details`]).

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::comparison::{
    compare_global, compare_pair, BackendTotals, PairTotals, PairwiseComparison, ResolvedPair,
};
use crate::network::Network;
use crate::record::TweakSet;

/// Why a backend produced no data for a height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    ConnectionError,
    TimeoutError,
    AuthError,
    MalformedResponseError,
    UnsupportedHeightError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ConnectionError => "ConnectionError",
            FailureKind::TimeoutError => "TimeoutError",
            FailureKind::AuthError => "AuthError",
            FailureKind::MalformedResponseError => "MalformedResponseError",
            FailureKind::UnsupportedHeightError => "UnsupportedHeightError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded backend failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl BackendFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// What one backend returned for one height. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendOutcome {
    pub backend_name: String,
    pub block_height: u64,
    pub result: std::result::Result<TweakSet, BackendFailure>,
    pub elapsed: Duration,
}

impl BackendOutcome {
    pub fn success(backend: &str, height: u64, tweaks: TweakSet, elapsed: Duration) -> Self {
        Self {
            backend_name: backend.to_string(),
            block_height: height,
            result: Ok(tweaks),
            elapsed,
        }
    }

    pub fn failure(backend: &str, height: u64, failure: BackendFailure, elapsed: Duration) -> Self {
        Self {
            backend_name: backend.to_string(),
            block_height: height,
            result: Err(failure),
            elapsed,
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Record sets behind the global comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditDetails {
    pub matching: TweakSet,
    pub non_matching: BTreeMap<String, TweakSet>,
}

/// Audit of a single height.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditResult {
    pub block_height: u64,
    pub tweak_counts: BTreeMap<String, usize>,
    pub matching_count: usize,
    pub non_matching_counts: BTreeMap<String, usize>,
    pub pairwise_comparisons: Vec<PairwiseComparison>,
    pub failures: BTreeMap<String, BackendFailure>,
    pub warnings: Vec<String>,
    pub request_times_ms: BTreeMap<String, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<AuditDetails>,
}

impl AuditResult {
    /// Fold the outcomes of one height into a result.
    ///
    /// Failed backends only appear in `failures`; a pair with a side that
    /// produced no set is skipped with a warning. `warnings` seeds the
    /// result's warning list.
    pub fn assemble(
        block_height: u64,
        outcomes: Vec<BackendOutcome>,
        pairs: &[ResolvedPair],
        mut warnings: Vec<String>,
    ) -> Self {
        let mut sets = BTreeMap::new();
        let mut failures = BTreeMap::new();
        let mut request_times_ms = BTreeMap::new();

        for outcome in outcomes {
            request_times_ms.insert(outcome.backend_name.clone(), outcome.elapsed.as_millis() as u64);
            match outcome.result {
                Ok(set) => {
                    sets.insert(outcome.backend_name, set);
                }
                Err(failure) => {
                    failures.insert(outcome.backend_name, failure);
                }
            }
        }

        let global = compare_global(&sets);

        let mut pairwise_comparisons = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let spec = &pair.spec;
            match (sets.get(&spec.backend1), sets.get(&spec.backend2)) {
                (Some(set1), Some(set2)) => {
                    let mut cmp = compare_pair(&spec.name, &spec.backend1, set1, &spec.backend2, set2);
                    if let Some(warning) = &pair.filter_warning {
                        warnings.push(format!("Pair '{}': {}", spec.name, warning));
                        cmp.filter_mismatch_warning = Some(warning.clone());
                    }
                    pairwise_comparisons.push(cmp);
                }
                _ => {
                    let missing = if sets.contains_key(&spec.backend1) {
                        &spec.backend2
                    } else {
                        &spec.backend1
                    };
                    let reason = if failures.contains_key(missing) {
                        "failed"
                    } else {
                        "returned no data"
                    };
                    warnings.push(format!(
                        "Skipping pair '{}': '{}' {} at height {}",
                        spec.name, missing, reason, block_height
                    ));
                }
            }
        }

        Self {
            block_height,
            tweak_counts: sets.iter().map(|(k, v)| (k.clone(), v.len())).collect(),
            matching_count: global.matching.len(),
            non_matching_counts: global
                .non_matching
                .iter()
                .map(|(k, v)| (k.clone(), v.len()))
                .collect(),
            pairwise_comparisons,
            failures,
            warnings,
            request_times_ms,
            details: Some(AuditDetails {
                matching: global.matching,
                non_matching: global.non_matching,
            }),
        }
    }

    /// Names of backends that succeeded at this height.
    pub fn successful_backends(&self) -> impl Iterator<Item = &str> {
        self.tweak_counts.keys().map(String::as_str)
    }

    /// Drop record sets so that only counts are serialized.
    pub fn strip_details(&mut self) {
        self.details = None;
        for cmp in &mut self.pairwise_comparisons {
            cmp.details = None;
        }
    }
}

/// Audit of an inclusive height range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeAuditResult {
    pub start_block: u64,
    pub end_block: u64,
    pub blocks_audited: u64,
    pub backend_summaries: BTreeMap<String, BackendTotals>,
    pub pair_summaries: Vec<PairTotals>,
    pub block_results: Vec<AuditResult>,
    pub stopped_early: bool,
}

impl RangeAuditResult {
    pub fn new(start_block: u64, end_block: u64) -> Self {
        Self {
            start_block,
            end_block,
            blocks_audited: 0,
            backend_summaries: BTreeMap::new(),
            pair_summaries: Vec::new(),
            block_results: Vec::new(),
            stopped_early: false,
        }
    }

    /// Append the next height's result, updating the summaries.
    pub fn fold(&mut self, result: AuditResult) {
        self.blocks_audited += 1;

        for (name, count) in &result.tweak_counts {
            let elapsed = result.request_times_ms.get(name).copied().unwrap_or_default();
            self.backend_summaries
                .entry(name.clone())
                .or_default()
                .record_success(*count, elapsed);
        }
        for name in result.failures.keys() {
            let elapsed = result.request_times_ms.get(name).copied().unwrap_or_default();
            self.backend_summaries
                .entry(name.clone())
                .or_default()
                .record_failure(elapsed);
        }

        for cmp in &result.pairwise_comparisons {
            let idx = match self.pair_summaries.iter().position(|p| p.pair_name == cmp.pair_name) {
                Some(idx) => idx,
                None => {
                    self.pair_summaries
                        .push(PairTotals::new(&cmp.pair_name, &cmp.backend1, &cmp.backend2));
                    self.pair_summaries.len() - 1
                }
            };
            self.pair_summaries[idx].add(cmp);
        }

        self.block_results.push(result);
    }

    pub fn strip_details(&mut self) {
        for result in &mut self.block_results {
            result.strip_details();
        }
    }

    /// Number of heights requested, whether or not they were audited.
    /// Saturates at `u64::MAX` for the full height range.
    pub fn requested_blocks(&self) -> u64 {
        self.end_block
            .saturating_sub(self.start_block)
            .saturating_add(1)
    }
}

/// Outcome of capturing reference data from one backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureReport {
    pub backend: String,
    pub network: Network,
    pub start_block: u64,
    pub end_block: u64,
    pub stored: Vec<u64>,
    pub failed: BTreeMap<u64, BackendFailure>,
}

impl CaptureReport {
    pub fn new(backend: &str, network: Network, start_block: u64, end_block: u64) -> Self {
        Self {
            backend: backend.to_string(),
            network,
            start_block,
            end_block,
            stored: Vec::new(),
            failed: BTreeMap::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
