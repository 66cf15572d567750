//! Range audit.

use clap::Args;

use crate::{config, output, GlobalArgs};

/// Arguments for the range command.
#[derive(Args)]
pub struct RangeArgs {
    /// First block height
    pub start_block: u64,

    /// Last block height (inclusive)
    pub end_block: u64,
}

/// Run the range command.
pub async fn run(global: &GlobalArgs, args: RangeArgs) -> i32 {
    if args.start_block > args.end_block {
        output::error(&format!(
            "Start block {} is after end block {}",
            args.start_block, args.end_block
        ));
        return 1;
    }

    let config = match config::load_validated(global) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let auditor = match super::build_auditor(config) {
        Ok(auditor) => auditor,
        Err(code) => return code,
    };
    super::stop_on_ctrl_c(auditor.stop_handle());

    let mut range = match auditor.audit_range(args.start_block, args.end_block).await {
        Ok(range) => range,
        Err(e) => {
            output::error(&format!("Error during range audit: {}", e));
            return 1;
        }
    };
    output::range_result(&range, global.detailed);

    if !global.detailed {
        range.strip_details();
    }
    super::export_if_requested(global, &range)
}
