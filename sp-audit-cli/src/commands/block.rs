//! Single block audit.

use clap::Args;

use crate::{config, output, GlobalArgs};

/// Arguments for the block command.
#[derive(Args)]
pub struct BlockArgs {
    /// Block height to audit
    pub block: u64,
}

/// Run the block command.
pub async fn run(global: &GlobalArgs, args: BlockArgs) -> i32 {
    let config = match config::load_validated(global) {
        Ok(config) => config,
        Err(code) => return code,
    };
    let auditor = match super::build_auditor(config) {
        Ok(auditor) => auditor,
        Err(code) => return code,
    };

    let mut result = auditor.audit_one(args.block).await;
    output::audit_result(&result, global.detailed);

    if !global.detailed {
        result.strip_details();
    }
    super::export_if_requested(global, &result)
}
