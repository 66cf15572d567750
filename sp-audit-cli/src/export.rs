//! JSON export of audit results.

use std::fs;
use std::path::Path;

use serde::Serialize;
use sp_audit_core::{AuditError, Result};

/// Pretty-print `value` as JSON into `path`, replacing any existing file.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| AuditError::Export(format!("cannot serialize results: {}", e)))?;
    fs::write(path, json + "\n")
        .map_err(|e| AuditError::Export(format!("cannot write {}: {}", path.display(), e)))
}
