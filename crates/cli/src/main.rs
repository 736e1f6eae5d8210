//! s3p - command-line client for S3-compatible object storage

mod commands;
mod exit_code;
mod output;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::commands::{Commands, TransferOverrides};
use crate::output::OutputConfig;

#[derive(Parser, Debug)]
#[command(name = "s3p", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct GlobalArgs {
    /// Emit JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    /// Part size in bytes for chunked transfers
    #[arg(long, global = true, value_name = "BYTES")]
    chunk_size: Option<u64>,

    /// Maximum parallel transfers for sync
    #[arg(long, global = true, value_name = "N")]
    concurrency: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.debug)?;

    let output_config = OutputConfig {
        json: cli.global.json,
        no_color: cli.global.no_color,
        quiet: cli.global.quiet,
    };
    let overrides = TransferOverrides {
        chunk_size: cli.global.chunk_size,
        concurrency: cli.global.concurrency,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let code = runtime.block_on(commands::execute(cli.command, output_config, overrides));
    drop(runtime);

    std::process::exit(code.as_i32());
}

/// Log to stderr so JSON on stdout stays parseable
fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let filter = if debug {
        EnvFilter::new("s3p=debug,s3p_core=debug,s3p_s3=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")
}
