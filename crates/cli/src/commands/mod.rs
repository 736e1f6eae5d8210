//! Command implementations
//!
//! Each command module exposes an `Args` struct for clap and an `execute`
//! function returning an [`ExitCode`]. Commands that talk to the store take a
//! ready [`Client`] so they can be exercised against `MemoryStore` in tests.

mod cat;
mod completions;
mod config;
mod cp;
mod ls;
mod pipe;
mod rm;
mod stat;
mod sync;

use std::sync::Arc;

use clap::Subcommand;
use s3p_core::{Client, Config, ConfigManager, Error, Location, TransferConfig};
use s3p_s3::S3Client;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List objects and prefixes
    Ls(ls::LsArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Write an object's contents to stdout
    Cat(cat::CatArgs),

    /// Copy between local files and the store, or within the store
    Cp(cp::CpArgs),

    /// Remove objects
    Rm(rm::RmArgs),

    /// Stream stdin into an object, publishing only on success
    Pipe(pipe::PipeArgs),

    /// Upload a local directory tree to a prefix
    Sync(sync::SyncArgs),

    /// Show or change the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Command-line overrides for the `[transfer]` config section
#[derive(Debug, Clone, Default)]
pub struct TransferOverrides {
    pub chunk_size: Option<u64>,
    pub concurrency: Option<usize>,
}

impl TransferOverrides {
    pub fn apply(&self, mut transfer: TransferConfig) -> TransferConfig {
        if let Some(chunk_size) = self.chunk_size {
            transfer = transfer.with_chunk_size(chunk_size);
        }
        if let Some(concurrency) = self.concurrency {
            transfer = transfer.with_concurrency(concurrency);
        }
        transfer
    }
}

/// Execute a parsed command
pub async fn execute(
    command: Commands,
    output_config: OutputConfig,
    overrides: TransferOverrides,
) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let command = match command {
        Commands::Config(cmd) => return config::execute(cmd, &formatter),
        Commands::Completions(args) => return completions::execute(args),
        command => command,
    };

    let client = match connect(&overrides, &formatter).await {
        Ok(client) => client,
        Err(code) => return code,
    };

    match command {
        Commands::Ls(args) => ls::execute(args, &client, &formatter).await,
        Commands::Stat(args) => stat::execute(args, &client, &formatter).await,
        Commands::Cat(args) => cat::execute(args, &client, &formatter).await,
        Commands::Cp(args) => cp::execute(args, &client, &formatter).await,
        Commands::Rm(args) => rm::execute(args, &client, &formatter).await,
        Commands::Pipe(args) => pipe::execute(args, &client, &formatter).await,
        Commands::Sync(args) => sync::execute(args, &client, &formatter).await,
        Commands::Config(_) | Commands::Completions(_) => ExitCode::Success,
    }
}

/// Load the config file, or report why it could not be loaded
pub fn load_config(formatter: &Formatter) -> Result<(ConfigManager, Config), ExitCode> {
    let manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            formatter.error(&format!("Failed to locate config directory: {e}"));
            return Err(ExitCode::GeneralError);
        }
    };

    match manager.load() {
        Ok(config) => Ok((manager, config)),
        Err(e) => {
            formatter.error(&format!(
                "Failed to load {}: {e}",
                manager.config_path().display()
            ));
            Err(ExitCode::from_error(&e))
        }
    }
}

/// Build a client backed by the configured S3 endpoint
async fn connect(overrides: &TransferOverrides, formatter: &Formatter) -> Result<Client, ExitCode> {
    let (_, config) = load_config(formatter)?;
    let transfer = overrides.apply(config.transfer);

    let s3 = match S3Client::new(&config.store, config.retry).await {
        Ok(client) => client,
        Err(e) => {
            formatter.error(&format!("Failed to create S3 client: {e}"));
            return Err(ExitCode::from_error(&e));
        }
    };

    Client::new(Arc::new(s3), transfer).map_err(|e| report(formatter, "Invalid transfer settings", &e))
}

/// Parse a location argument, reporting malformed input as a usage error
fn parse_location(arg: &str, formatter: &Formatter) -> Result<Location, ExitCode> {
    Location::parse(arg).map_err(|e| {
        formatter.error(&e.to_string());
        ExitCode::UsageError
    })
}

/// Print `context: error` and pick the matching exit code
fn report(formatter: &Formatter, context: &str, error: &Error) -> ExitCode {
    formatter.error(&format!("{context}: {error}"));
    ExitCode::from_error(error)
}

/// Whether a command-line argument names a remote location
fn is_remote(arg: &str) -> bool {
    arg.contains("://")
}
