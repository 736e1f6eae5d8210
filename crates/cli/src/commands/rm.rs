//! rm command - Remove objects

use clap::Args;
use futures::TryStreamExt;
use s3p_core::{Client, Error, Location};
use serde::Serialize;

use super::{parse_location, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Remove objects
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Objects to remove (s3://bucket/key)
    #[arg(required = true)]
    pub locations: Vec<String>,

    /// Remove every object below each location
    #[arg(short, long)]
    pub recursive: bool,
}

#[derive(Debug, Default, Serialize)]
struct RmOutput {
    deleted: Vec<String>,
    failed: Vec<String>,
}

pub async fn execute(args: RmArgs, client: &Client, formatter: &Formatter) -> ExitCode {
    let mut roots = Vec::with_capacity(args.locations.len());
    for arg in &args.locations {
        match parse_location(arg, formatter) {
            Ok(location) => roots.push(location),
            Err(code) => return code,
        }
    }

    let mut targets = Vec::new();
    for root in roots {
        if args.recursive {
            match expand(client, &root).await {
                Ok(found) => targets.extend(found),
                Err(e) => return report(formatter, &format!("Failed to list {root}"), &e),
            }
        } else if root.is_dir_like() {
            formatter.error(&format!("'{root}' is a prefix; use --recursive"));
            return ExitCode::UsageError;
        } else {
            targets.push(root);
        }
    }

    let mut output = RmOutput::default();
    let mut first_error: Option<Error> = None;
    for target in targets {
        match client.delete(&target).await {
            Ok(()) => {
                formatter.success(&format!("Removed {target}"));
                output.deleted.push(target.to_string());
            }
            Err(e) => {
                formatter.error(&format!("Failed to remove {target}: {e}"));
                output.failed.push(target.to_string());
                first_error.get_or_insert(e);
            }
        }
    }

    if formatter.is_json() {
        formatter.json(&output);
    }

    match first_error {
        Some(e) => ExitCode::from_error(&e),
        None => ExitCode::Success,
    }
}

/// Every object under `root`, treating a bare path as a directory
async fn expand(client: &Client, root: &Location) -> s3p_core::Result<Vec<Location>> {
    let prefix = if root.is_dir_like() {
        root.clone()
    } else {
        root.with_path(format!("{}/", root.path()))
    };
    let found: Vec<Location> = client.list(&prefix, true).try_collect().await?;
    Ok(found.into_iter().filter(|l| !l.is_dir_like()).collect())
}
