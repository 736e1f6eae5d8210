//! config command - Show or change the configuration file

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Subcommand};
use s3p_core::Config;

use super::load_config;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration (secret key masked)
    Show,

    /// Set a single value, e.g. `store.endpoint http://localhost:9000`
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Dotted key: store.{endpoint,region,access_key,secret_key,path_style},
    /// transfer.{chunk_size,concurrency,scratch_dir},
    /// retry.{max_attempts,initial_backoff_ms,max_backoff_ms}
    pub key: String,

    pub value: String,
}

const MASK: &str = "********";

pub fn execute(cmd: ConfigCommands, formatter: &Formatter) -> ExitCode {
    let (manager, mut config) = match load_config(formatter) {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    match cmd {
        ConfigCommands::Show => {
            let masked = masked(config);
            if formatter.is_json() {
                formatter.json(&masked);
                return ExitCode::Success;
            }
            match toml::to_string_pretty(&masked) {
                Ok(rendered) => {
                    formatter.println(&format!(
                        "# {}",
                        formatter.style_location(&manager.config_path().display().to_string())
                    ));
                    formatter.println(rendered.trim_end());
                    ExitCode::Success
                }
                Err(e) => {
                    formatter.error(&format!("Failed to render config: {e}"));
                    ExitCode::GeneralError
                }
            }
        }
        ConfigCommands::Set(args) => {
            if let Err(message) = apply_setting(&mut config, &args.key, &args.value) {
                formatter.error(&message);
                return ExitCode::UsageError;
            }
            if let Err(e) = config.transfer.validate().and_then(|_| config.store.validate()) {
                formatter.error(&e.to_string());
                return ExitCode::UsageError;
            }
            if let Err(e) = manager.save(&config) {
                formatter.error(&format!("Failed to save config: {e}"));
                return ExitCode::GeneralError;
            }
            formatter.success(&format!("Set {}", args.key));
            ExitCode::Success
        }
    }
}

fn masked(mut config: Config) -> Config {
    if config.store.secret_key.is_some() {
        config.store.secret_key = Some(MASK.to_string());
    }
    config
}

/// Set one dotted key from its string form
fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<(), String> {
    let optional = |v: &str| (!v.is_empty()).then(|| v.to_string());

    match key {
        "store.endpoint" => config.store.endpoint = optional(value),
        "store.region" => config.store.region = value.to_string(),
        "store.access_key" => config.store.access_key = optional(value),
        "store.secret_key" => config.store.secret_key = optional(value),
        "store.path_style" => config.store.path_style = parse(key, value)?,
        "transfer.chunk_size" => config.transfer.chunk_size = parse(key, value)?,
        "transfer.concurrency" => config.transfer.concurrency = parse(key, value)?,
        "transfer.scratch_dir" => config.transfer.scratch_dir = optional(value).map(PathBuf::from),
        "retry.max_attempts" => config.retry.max_attempts = parse(key, value)?,
        "retry.initial_backoff_ms" => config.retry.initial_backoff_ms = parse(key, value)?,
        "retry.max_backoff_ms" => config.retry.max_backoff_ms = parse(key, value)?,
        _ => return Err(format!("Unknown config key '{key}'")),
    }
    Ok(())
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| format!("Invalid value '{value}' for {key}: {e}"))
}
