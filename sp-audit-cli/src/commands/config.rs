//! Configuration listing and validation.

use clap::Args;

use crate::{config, output, GlobalArgs};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    /// List configured backends and pairs
    #[arg(long)]
    pub list: bool,

    /// Validate the configuration
    #[arg(long)]
    pub validate: bool,
}

/// Run the config command.
pub fn run(global: &GlobalArgs, args: ConfigArgs) -> i32 {
    if !args.list && !args.validate {
        output::error("No configuration action specified");
        output::hint("Use `sp-audit config --list` or `sp-audit config --validate`");
        return 1;
    }

    let config = match config::load(global) {
        Ok(config) => config,
        Err(code) => return code,
    };

    if args.list {
        output::config_listing(&config);
    }

    if args.validate {
        let issues = config.validate();
        if !issues.is_empty() {
            output::validation_issues(&issues);
            return 1;
        }
        output::success("Configuration is valid.");
    }
    0
}
