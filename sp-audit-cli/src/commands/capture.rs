//! Reference data capture.

use clap::Args;

use crate::{config, output, GlobalArgs};

/// Arguments for the capture command.
#[derive(Args)]
pub struct CaptureArgs {
    /// Backend to capture from
    pub backend: String,

    /// First block height
    pub start_block: u64,

    /// Last block height (defaults to the first)
    pub end_block: Option<u64>,
}

/// Run the capture command.
pub async fn run(global: &GlobalArgs, args: CaptureArgs) -> i32 {
    let end_block = args.end_block.unwrap_or(args.start_block);

    let config = match config::load_validated(global) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let reference_dir = config.reference_dir.clone();
    let auditor = match super::build_auditor(config) {
        Ok(auditor) => auditor,
        Err(code) => return code,
    };
    super::stop_on_ctrl_c(auditor.stop_handle());

    let report = match auditor
        .capture_reference(&args.backend, args.start_block, end_block)
        .await
    {
        Ok(report) => report,
        Err(e) => {
            output::error(&format!("Capture failed: {}", e));
            return 1;
        }
    };

    output::capture_report(&report);
    output::kv("Reference directory", &reference_dir.display().to_string());

    let code = super::export_if_requested(global, &report);
    if report.is_complete() {
        code
    } else {
        1
    }
}
