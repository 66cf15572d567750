//! Configuration loading for the commands.

use std::path::PathBuf;
use std::sync::Arc;

use sp_audit_core::{AuditConfig, FileReferenceStore, ReferenceStore};

use crate::output;
use crate::GlobalArgs;

/// Used when neither `--config` nor `SP_AUDIT_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

pub fn config_path(global: &GlobalArgs) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load the configuration and apply command-line overrides.
///
/// Prints the error and returns the exit code on failure.
pub fn load(global: &GlobalArgs) -> Result<AuditConfig, i32> {
    let path = config_path(global);
    let mut config = AuditConfig::from_path(&path).map_err(|e| {
        output::error(&e.to_string());
        output::hint("Pass --config <file> or set SP_AUDIT_CONFIG");
        1
    })?;

    if global.suppress_filter_warnings {
        config.suppress_filter_warnings = true;
    }
    Ok(config)
}

/// Load and validate; every issue is printed before failing.
pub fn load_validated(global: &GlobalArgs) -> Result<AuditConfig, i32> {
    let config = load(global)?;
    if config.backends.is_empty() {
        output::error("No backends configured");
        output::hint("Copy sample.config.json to config.json or pass --config <file>");
        return Err(1);
    }

    let issues = config.validate();
    if !issues.is_empty() {
        output::validation_issues(&issues);
        return Err(1);
    }
    Ok(config)
}

pub fn reference_store(config: &AuditConfig) -> Arc<dyn ReferenceStore> {
    Arc::new(FileReferenceStore::new(&config.reference_dir))
}
