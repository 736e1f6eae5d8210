//! stat command - Show object metadata

use clap::Args;
use s3p_core::{Client, ObjectInfo};

use super::{parse_location, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, human_size};

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object to inspect (s3://bucket/key)
    pub location: String,
}

pub async fn execute(args: StatArgs, client: &Client, formatter: &Formatter) -> ExitCode {
    let location = match parse_location(&args.location, formatter) {
        Ok(location) => location,
        Err(code) => return code,
    };

    match client.stat(&location).await {
        Ok(info) => {
            if formatter.is_json() {
                formatter.json(&info);
            } else {
                formatter.println(&render(&info, formatter));
            }
            ExitCode::Success
        }
        Err(e) => report(formatter, &format!("Failed to stat {location}"), &e),
    }
}

fn render(info: &ObjectInfo, formatter: &Formatter) -> String {
    let mut rows = vec![
        ("Location", formatter.style_location(&info.location.to_string())),
        (
            "Size",
            formatter.style_size(&format!(
                "{} ({} bytes)",
                human_size(info.size_bytes),
                info.size_bytes
            )),
        ),
    ];
    if let Some(modified) = &info.last_modified {
        rows.push(("Modified", formatter.style_date(&modified.to_string())));
    }
    if let Some(etag) = &info.etag {
        rows.push(("ETag", etag.clone()));
    }
    if let Some(content_type) = &info.content_type {
        rows.push(("Type", content_type.clone()));
    }

    rows.into_iter()
        .map(|(key, value)| format!("{}: {value}", formatter.style_key(&format!("{key:<8}"))))
        .collect::<Vec<_>>()
        .join("\n")
}
