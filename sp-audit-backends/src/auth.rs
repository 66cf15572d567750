//! Credentials for HTTP and JSON-RPC backends.

use std::fs;
use std::path::{Path, PathBuf};

use sp_audit_core::BackendConfig;

use crate::error::{BackendError, Result};

/// Basic-auth credentials resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Resolve credentials for a backend.
///
/// A cookie file takes precedence over inline `auth`. The cookie is re-read
/// on every call since Bitcoin Core rotates it on restart.
pub fn resolve(config: &BackendConfig) -> Result<Option<Credentials>> {
    if let Some(path) = &config.cookie_file {
        return read_cookie(&expand_home(path)).map(Some);
    }

    Ok(config.auth.as_ref().map(|auth| Credentials {
        username: auth.username.clone(),
        password: auth.password.clone(),
    }))
}

/// Parse a `user:password` cookie file.
pub fn read_cookie(path: &Path) -> Result<Credentials> {
    let content = fs::read_to_string(path)
        .map_err(|e| BackendError::Auth(format!("cannot read cookie file {}: {}", path.display(), e)))?;

    let (username, password) = content
        .trim()
        .split_once(':')
        .ok_or_else(|| BackendError::Auth(format!("invalid cookie file format in {}", path.display())))?;

    tracing::debug!(user = username, "loaded cookie authentication");
    Ok(Credentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
