//! Silent Payments tweak auditor CLI
//!
//! Cross-checks the tweak data served by independent indexers, block by
//! block.

mod commands;
mod config;
mod export;
mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sp-audit")]
#[command(version)]
#[command(about = "Silent Payments tweak auditor - compare tweak indexers block by block", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options accepted before or after the subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Configuration file (JSON, or TOML by extension)
    #[arg(short, long, global = true, env = "SP_AUDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity: -v for INFO, -vv for DEBUG
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Show the differing tweak values
    #[arg(short, long, global = true)]
    pub detailed: bool,

    /// Save results to a JSON file
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// Do not warn about pairs with different filter settings
    #[arg(long, global = true)]
    pub suppress_filter_warnings: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Audit a single block
    #[command(alias = "audit-block")]
    Block(commands::block::BlockArgs),

    /// Audit an inclusive range of blocks
    #[command(alias = "audit-range")]
    Range(commands::range::RangeArgs),

    /// List or validate the configuration
    Config(commands::config::ConfigArgs),

    /// Capture reference data from a backend
    Capture(commands::capture::CaptureArgs),
}

fn init_logging(global: &GlobalArgs) {
    let default_level = match global.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if global.log_json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.global);

    let exit_code = match cli.command {
        Commands::Block(args) => commands::block::run(&cli.global, args).await,
        Commands::Range(args) => commands::range::run(&cli.global, args).await,
        Commands::Config(args) => commands::config::run(&cli.global, args),
        Commands::Capture(args) => commands::capture::run(&cli.global, args).await,
    };

    std::process::exit(exit_code);
}
