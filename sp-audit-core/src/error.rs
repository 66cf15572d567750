//! Error types for the auditor core library.
//!
//! Configuration problems are fatal and abort a run before any backend is
//! queried. Reference store and export failures are surfaced to the caller
//! but never invalidate results that were already computed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in core auditor operations.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The configuration file could not be read or parsed.
    #[error("Failed to load config from {path}: {reason}")]
    ConfigLoad {
        /// Path of the configuration file
        path: PathBuf,
        /// Underlying reason
        reason: String,
    },

    /// The configuration is structurally invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A pair references a backend that is neither configured nor the
    /// virtual reference backend.
    #[error("Pair '{pair}' references unknown backend '{backend}'")]
    UnknownBackend {
        /// Name of the offending pair
        pair: String,
        /// The backend name that could not be resolved
        backend: String,
    },

    /// No backend is marked active.
    #[error("No active backends configured")]
    NoActiveBackends,

    /// Reading or writing canonical reference data failed.
    #[error("Reference store error: {0}")]
    ReferenceStore(String),

    /// Persisting audit output failed.
    #[error("Export error: {0}")]
    Export(String),

    /// A tweak value could not be canonicalized.
    #[error("Invalid tweak value '{0}': expected hex")]
    InvalidTweak(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, AuditError>;
