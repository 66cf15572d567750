//! Comparison engine.
//!
//! Pure set algebra over normalized [`TweakSet`]s. Nothing here knows about
//! protocols or failures: callers only ever pass the sets of backends that
//! succeeded.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::config::{AuditConfig, BackendConfig, PairSpec, REFERENCE_BACKEND};
use crate::error::{AuditError, Result};
use crate::record::TweakSet;

/// Result of intersecting every successful backend's set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalComparison {
    /// Records reported by every successful backend.
    pub matching: TweakSet,
    /// Per backend, the records not shared by all others.
    pub non_matching: BTreeMap<String, TweakSet>,
}

/// Full record sets behind a pairwise comparison. Only serialized in
/// detailed mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PairDetails {
    pub matching: TweakSet,
    pub unique1: TweakSet,
    pub unique2: TweakSet,
}

/// Comparison of two backends at one height.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseComparison {
    pub pair_name: String,
    pub backend1: String,
    pub backend2: String,
    pub count1: usize,
    pub count2: usize,
    pub matching_count: usize,
    pub unique1: usize,
    pub unique2: usize,
    pub match_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_mismatch_warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<PairDetails>,
}

impl PairwiseComparison {
    /// Size of `set1 ∪ set2`.
    #[inline]
    pub fn union_count(&self) -> usize {
        self.count1 + self.count2 - self.matching_count
    }
}

/// Intersect all successful sets.
///
/// With fewer than two sets nothing can be confirmed, so `matching` is empty
/// and every record is non-matching.
pub fn compare_global(sets: &BTreeMap<String, TweakSet>) -> GlobalComparison {
    let matching: TweakSet = if sets.len() < 2 {
        TweakSet::new()
    } else {
        let mut iter = sets.values();
        let first = iter.next().cloned().unwrap_or_default();
        iter.fold(first, |acc, set| acc.intersection(set).cloned().collect())
    };

    let non_matching = sets
        .iter()
        .map(|(name, set)| (name.clone(), set.difference(&matching).cloned().collect()))
        .collect();

    GlobalComparison {
        matching,
        non_matching,
    }
}

/// Compare two backends' sets for one pair.
pub fn compare_pair(
    pair_name: &str,
    backend1: &str,
    set1: &TweakSet,
    backend2: &str,
    set2: &TweakSet,
) -> PairwiseComparison {
    let matching: TweakSet = set1.intersection(set2).cloned().collect();
    let unique1: TweakSet = set1.difference(set2).cloned().collect();
    let unique2: TweakSet = set2.difference(set1).cloned().collect();
    let union = set1.len() + set2.len() - matching.len();

    PairwiseComparison {
        pair_name: pair_name.to_string(),
        backend1: backend1.to_string(),
        backend2: backend2.to_string(),
        count1: set1.len(),
        count2: set2.len(),
        matching_count: matching.len(),
        unique1: unique1.len(),
        unique2: unique2.len(),
        match_percentage: match_percentage(matching.len(), union),
        filter_mismatch_warning: None,
        details: Some(PairDetails {
            matching,
            unique1,
            unique2,
        }),
    }
}

/// `100 × matching / union`, rounded to one decimal. `0.0` on an empty union.
pub fn match_percentage(matching: usize, union: usize) -> f64 {
    if union == 0 {
        return 0.0;
    }
    let pct = 100.0 * matching as f64 / union as f64;
    (pct * 10.0).round() / 10.0
}

/// Warning text when two backends apply different output filters.
///
/// The virtual reference backend has no filter settings of its own and is
/// never reported.
pub fn filter_mismatch(b1: &BackendConfig, b2: &BackendConfig) -> Option<String> {
    let (f1, f2) = (b1.filter_options(), b2.filter_options());
    if f1 == f2 {
        return None;
    }
    Some(format!(
        "Filter settings differ between '{}' ({}) and '{}' ({}); counts may not be directly comparable",
        b1.name, f1, b2.name, f2
    ))
}

/// A pair ready for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPair {
    pub spec: PairSpec,
    /// Whether one side is the virtual reference backend.
    pub uses_virtual_reference: bool,
    pub filter_warning: Option<String>,
}

/// Outcome of [`resolve_pairs`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PairResolution {
    pub pairs: Vec<ResolvedPair>,
    /// Active pairs dropped because a side is configured but inactive.
    pub inactive: Vec<String>,
}

impl PairResolution {
    pub fn needs_virtual_reference(&self) -> bool {
        self.pairs.iter().any(|p| p.uses_virtual_reference)
    }
}

/// Decide which pairs are compared in this run.
///
/// Explicit active pairs win. Without any, exactly two active backends get a
/// synthesized `"<b1> vs <b2>"` pair. The name `reference` resolves to the
/// virtual reference backend unless a backend of that name is configured.
///
/// # Errors
///
/// `UnknownBackend` when a pair names a backend that is neither configured
/// nor the virtual reference.
pub fn resolve_pairs(config: &AuditConfig) -> Result<PairResolution> {
    let active: Vec<&BackendConfig> = config.active_backends().collect();
    let active_names: HashSet<&str> = active.iter().map(|b| b.name.as_str()).collect();
    let virtual_available = config.backend(REFERENCE_BACKEND).is_none();

    let explicit: Vec<&PairSpec> = config.active_pairs().collect();
    let mut resolution = PairResolution::default();

    if explicit.is_empty() {
        if let [a, b] = active.as_slice() {
            let spec = PairSpec::new(format!("{} vs {}", a.name, b.name), &a.name, &b.name);
            resolution.pairs.push(ResolvedPair {
                spec,
                uses_virtual_reference: false,
                filter_warning: pair_filter_warning(config, a, b),
            });
        }
        return Ok(resolution);
    }

    for spec in explicit {
        let mut uses_virtual = false;
        let mut inactive = false;
        for side in [&spec.backend1, &spec.backend2] {
            if side == REFERENCE_BACKEND && virtual_available {
                uses_virtual = true;
            } else if config.backend(side).is_none() {
                return Err(AuditError::UnknownBackend {
                    pair: spec.name.clone(),
                    backend: side.clone(),
                });
            } else if !active_names.contains(side.as_str()) {
                inactive = true;
            }
        }

        if inactive {
            resolution.inactive.push(spec.name.clone());
            continue;
        }

        let filter_warning = match (config.backend(&spec.backend1), config.backend(&spec.backend2)) {
            (Some(b1), Some(b2)) if !uses_virtual => pair_filter_warning(config, b1, b2),
            _ => None,
        };

        resolution.pairs.push(ResolvedPair {
            spec: spec.clone(),
            uses_virtual_reference: uses_virtual,
            filter_warning,
        });
    }

    Ok(resolution)
}

fn pair_filter_warning(config: &AuditConfig, b1: &BackendConfig, b2: &BackendConfig) -> Option<String> {
    if config.suppress_filter_warnings {
        None
    } else {
        filter_mismatch(b1, b2)
    }
}

/// Range totals of one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackendTotals {
    pub total_tweaks: usize,
    pub blocks_processed: u64,
    pub failures: u64,
    pub total_request_time_ms: u64,
}

impl BackendTotals {
    pub fn record_success(&mut self, tweaks: usize, elapsed_ms: u64) {
        self.total_tweaks += tweaks;
        self.blocks_processed += 1;
        self.total_request_time_ms += elapsed_ms;
    }

    pub fn record_failure(&mut self, elapsed_ms: u64) {
        self.failures += 1;
        self.total_request_time_ms += elapsed_ms;
    }
}

/// Range totals of one pair. The overall percentage is recomputed from the
/// summed union, never averaged across heights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairTotals {
    pub pair_name: String,
    pub backend1: String,
    pub backend2: String,
    pub blocks_compared: u64,
    pub count1: usize,
    pub count2: usize,
    pub matching_count: usize,
    pub unique1: usize,
    pub unique2: usize,
    pub match_percentage: f64,
}

impl PairTotals {
    pub fn new(pair_name: &str, backend1: &str, backend2: &str) -> Self {
        Self {
            pair_name: pair_name.to_string(),
            backend1: backend1.to_string(),
            backend2: backend2.to_string(),
            blocks_compared: 0,
            count1: 0,
            count2: 0,
            matching_count: 0,
            unique1: 0,
            unique2: 0,
            match_percentage: 0.0,
        }
    }

    pub fn add(&mut self, cmp: &PairwiseComparison) {
        self.blocks_compared += 1;
        self.count1 += cmp.count1;
        self.count2 += cmp.count2;
        self.matching_count += cmp.matching_count;
        self.unique1 += cmp.unique1;
        self.unique2 += cmp.unique2;
        self.match_percentage = match_percentage(self.matching_count, self.union_count());
    }

    #[inline]
    pub fn union_count(&self) -> usize {
        self.matching_count + self.unique1 + self.unique2
    }
}
