//! # sp-audit core
//!
//! **Silent Payments tweak auditor: data model and comparison engine**
//!
//! Indexers that serve BIP352 silent-payment tweaks each compute them
//! independently. This crate holds everything needed to compare their output
//! without touching the network:
//!
//! - [`TweakRecord`]: the canonical record every backend response is reduced to
//! - [`AuditConfig`]: backend and pair configuration, loaded from JSON or TOML
//! - [`comparison`]: global and pairwise set algebra, range aggregation
//! - [`AuditResult`] / [`RangeAuditResult`]: the serialized audit output
//! - [`ReferenceStore`]: captured canonical data for the `reference` backend
//!
//! No network I/O, no async. The query layer lives in `sp-audit-backends`.
//!
//! ## Quick Start
//!
//! ```rust
//! use sp_audit_core::{comparison, TweakRecord, TweakSet};
//!
//! let core: TweakSet = ["02aa", "02bb"]
//!     .iter()
//!     .map(|t| TweakRecord::new(840_000, None, t).unwrap())
//!     .collect();
//! let oracle: TweakSet = ["0x02AA"]
//!     .iter()
//!     .map(|t| TweakRecord::new(840_000, None, t).unwrap())
//!     .collect();
//!
//! let cmp = comparison::compare_pair("core-vs-oracle", "core", &core, "oracle", &oracle);
//! assert_eq!(cmp.matching_count, 1);
//! assert_eq!(cmp.match_percentage, 50.0);
//! ```

pub mod comparison;
pub mod config;
pub mod error;
pub mod network;
pub mod record;
pub mod reference;
pub mod result;

// Re-export main types for convenience
pub use comparison::{PairwiseComparison, ResolvedPair};
pub use config::{AuditConfig, BackendConfig, PairSpec, Protocol, REFERENCE_BACKEND};
pub use error::{AuditError, Result};
pub use network::Network;
pub use record::{TweakRecord, TweakSet};
pub use reference::{FileReferenceStore, MemoryReferenceStore, ReferenceStore};
pub use result::{
    AuditResult, BackendFailure, BackendOutcome, CaptureReport, FailureKind, RangeAuditResult,
};
