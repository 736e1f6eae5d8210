//! ls command - List objects and prefixes
//!
//! A location that does not end in `/` is listed as if it did, so
//! `s3p ls s3://bucket/logs` shows the contents of `logs/` rather than every
//! key that happens to start with `logs`.

use clap::Args;
use comfy_table::{Table, presets};
use futures::TryStreamExt;
use s3p_core::{Client, Location};
use serde::Serialize;

use super::{parse_location, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, human_size};

/// List objects and prefixes
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Prefix to list (s3://bucket[/prefix])
    pub location: String,

    /// List every object below the prefix instead of one level
    #[arg(short, long)]
    pub recursive: bool,

    /// Show size and modification time (one stat per object)
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Debug, Serialize)]
struct ListEntry {
    location: String,
    name: String,
    is_prefix: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
}

pub async fn execute(args: LsArgs, client: &Client, formatter: &Formatter) -> ExitCode {
    let location = match parse_location(&args.location, formatter) {
        Ok(location) => location,
        Err(code) => return code,
    };
    let prefix = listing_prefix(&location);

    let locations: Vec<Location> = match client.list(&prefix, args.recursive).try_collect().await {
        Ok(locations) => locations,
        Err(e) => return report(formatter, &format!("Failed to list {prefix}"), &e),
    };

    let mut entries = Vec::with_capacity(locations.len());
    for item in locations {
        let mut entry = ListEntry {
            location: item.to_string(),
            name: item.relative_to(&prefix).unwrap_or(item.path()).to_string(),
            is_prefix: item.is_dir_like(),
            size_bytes: None,
            last_modified: None,
        };
        if args.long && !entry.is_prefix {
            match client.stat(&item).await {
                Ok(info) => {
                    entry.size_bytes = Some(info.size_bytes);
                    entry.last_modified = info.last_modified.map(|t| t.to_string());
                }
                Err(e) => return report(formatter, &format!("Failed to stat {item}"), &e),
            }
        }
        entries.push(entry);
    }

    if formatter.is_json() {
        formatter.json(&entries);
    } else if args.long {
        formatter.println(&render_table(&entries, formatter));
    } else {
        for entry in &entries {
            formatter.println(&render_name(entry, formatter));
        }
    }

    ExitCode::Success
}

/// Treat a bare object path as a directory to list
fn listing_prefix(location: &Location) -> Location {
    if location.is_dir_like() {
        location.clone()
    } else {
        location.with_path(format!("{}/", location.path()))
    }
}

fn render_name(entry: &ListEntry, formatter: &Formatter) -> String {
    if entry.is_prefix {
        formatter.style_prefix(&entry.name)
    } else {
        entry.name.clone()
    }
}

fn render_table(entries: &[ListEntry], formatter: &Formatter) -> String {
    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    for entry in entries {
        let size = entry
            .size_bytes
            .map(|s| formatter.style_size(&human_size(s)))
            .unwrap_or_default();
        let modified = entry
            .last_modified
            .as_deref()
            .map(|t| formatter.style_date(t))
            .unwrap_or_default();
        table.add_row(vec![size, modified, render_name(entry, formatter)]);
    }
    table.to_string()
}
