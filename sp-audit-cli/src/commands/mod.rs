//! CLI command implementations.

pub mod block;
pub mod capture;
pub mod config;
pub mod range;

use serde::Serialize;
use sp_audit_backends::{Auditor, StopHandle};
use sp_audit_core::AuditConfig;

use crate::{export, output, GlobalArgs};

/// Build the auditor, printing configuration errors.
pub(crate) fn build_auditor(config: AuditConfig) -> Result<Auditor, i32> {
    let store = crate::config::reference_store(&config);
    Auditor::new(config, store).map_err(|e| {
        output::error(&e.to_string());
        1
    })
}

/// Stop issuing new heights on Ctrl-C.
pub(crate) fn stop_on_ctrl_c(handle: StopHandle) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight blocks");
            handle.stop();
        }
    });
}

/// Write `--output` if requested; returns the exit code.
pub(crate) fn export_if_requested<T: Serialize>(global: &GlobalArgs, value: &T) -> i32 {
    let Some(path) = &global.output else {
        return 0;
    };
    match export::write_json(path, value) {
        Ok(()) => {
            output::info(&format!("Results saved to {}", path.display()));
            0
        }
        Err(e) => {
            output::error(&e.to_string());
            1
        }
    }
}
