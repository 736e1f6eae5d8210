//! sync command - Upload a local directory tree to a prefix
//!
//! `--exclude` takes glob patterns relative to the source directory. They are
//! expanded against the filesystem before the sync starts, and the resulting
//! relative paths form the exact exclusion set handed to the engine. A pattern
//! that matches a directory excludes every file below it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use s3p_core::{
    Client, Error, Location, ProgressFn, SyncOptions, SyncPlan, SyncResult, TransferTask,
};
use serde::Serialize;

use super::{parse_location, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Upload a local directory tree to a prefix
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Local directory to upload
    pub source: PathBuf,

    /// Destination prefix (s3://bucket[/prefix])
    pub destination: String,

    /// Skip files matching this glob, relative to the source (repeatable)
    #[arg(short, long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,

    /// Show what would be uploaded without transferring anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct SyncOutput {
    source: String,
    destination: String,
    dry_run: bool,
    planned: usize,
    uploaded: usize,
    failed: usize,
    excluded: usize,
    failures: Vec<FailureOutput>,
}

#[derive(Debug, Serialize)]
struct FailureOutput {
    path: String,
    destination: String,
    error: String,
}

impl SyncOutput {
    fn from_plan(source: &Path, destination: &Location, plan: &SyncPlan) -> Self {
        Self {
            source: source.display().to_string(),
            destination: destination.to_string(),
            dry_run: true,
            planned: plan.tasks.len(),
            uploaded: 0,
            failed: 0,
            excluded: plan.excluded,
            failures: Vec::new(),
        }
    }

    fn from_result(source: &Path, destination: &Location, result: &SyncResult) -> Self {
        Self {
            source: source.display().to_string(),
            destination: destination.to_string(),
            dry_run: false,
            planned: result.total(),
            uploaded: result.succeeded_count(),
            failed: result.failed_count(),
            excluded: result.excluded,
            failures: result
                .failures
                .iter()
                .map(|f| FailureOutput {
                    path: f.relative_path.clone(),
                    destination: f.destination.to_string(),
                    error: f.error.to_string(),
                })
                .collect(),
        }
    }
}

pub async fn execute(args: SyncArgs, client: &Client, formatter: &Formatter) -> ExitCode {
    let destination = match parse_location(&args.destination, formatter) {
        Ok(location) => location,
        Err(code) => return code,
    };

    let exclude = match expand_excludes(&args.source, &args.excludes) {
        Ok(expanded) => {
            for pattern in &expanded.unmatched {
                formatter.warning(&format!("Exclude pattern '{pattern}' matched nothing"));
            }
            expanded.paths
        }
        Err(message) => {
            formatter.error(&message);
            return ExitCode::UsageError;
        }
    };

    let plan = match client.plan_sync(&args.source, &destination, &exclude).await {
        Ok(plan) => plan,
        Err(e) => {
            return report(
                formatter,
                &format!("Cannot sync {}", args.source.display()),
                &e,
            );
        }
    };

    if args.dry_run {
        let output = SyncOutput::from_plan(&args.source, &destination, &plan);
        if formatter.is_json() {
            formatter.json(&output);
        } else {
            for task in &plan.tasks {
                formatter.println(&format!("  + {} -> {}", task.relative_path, task.destination));
            }
            formatter.println(&format!(
                "Dry run: {} to upload, {} excluded",
                output.planned, output.excluded
            ));
        }
        return ExitCode::Success;
    }

    let progress = formatter
        .progress_enabled()
        .then(|| progress_bar(plan.tasks.len() as u64));

    let mut options = SyncOptions::new();
    if let Some(bar) = &progress {
        options = options.on_progress(progress_callback(bar.clone()));
    }

    let result = match client.run_plan(plan, options).await {
        Ok(result) => result,
        Err(e) => {
            if let Some(bar) = &progress {
                bar.abandon();
            }
            return report(
                formatter,
                &format!("Cannot sync {}", args.source.display()),
                &e,
            );
        }
    };

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    let output = SyncOutput::from_result(&args.source, &destination, &result);
    if formatter.is_json() {
        formatter.json(&output);
    } else {
        for failure in &output.failures {
            formatter.error(&format!("{}: {}", failure.path, failure.error));
        }
        formatter.println(&format!(
            "Sync complete: {} uploaded, {} failed, {} excluded",
            output.uploaded, output.failed, output.excluded
        ));
    }

    if result.is_success() {
        ExitCode::Success
    } else {
        ExitCode::PartialFailure
    }
}

struct ExpandedExcludes {
    paths: HashSet<String>,
    unmatched: Vec<String>,
}

/// Expand exclusion globs into `/`-separated paths relative to `root`
///
/// Matched files are taken as-is; a matched directory contributes every
/// regular file beneath it.
fn expand_excludes(root: &Path, patterns: &[String]) -> Result<ExpandedExcludes, String> {
    let mut expanded = ExpandedExcludes {
        paths: HashSet::new(),
        unmatched: Vec::new(),
    };
    let base = glob::Pattern::escape(&root.to_string_lossy());

    for pattern in patterns {
        let full = format!("{base}/{}", pattern.trim_start_matches('/'));
        let paths =
            glob::glob(&full).map_err(|e| format!("Invalid exclude pattern '{pattern}': {e}"))?;

        let mut matched = Vec::new();
        for path in readable(paths) {
            if path.is_dir() {
                let below = format!("{}/**/*", glob::Pattern::escape(&path.to_string_lossy()));
                let files = glob::glob(&below)
                    .map_err(|e| format!("Invalid exclude pattern '{pattern}': {e}"))?;
                matched.extend(readable(files).filter(|p| p.is_file()));
            } else if path.is_file() {
                matched.push(path);
            }
        }

        if matched.is_empty() {
            expanded.unmatched.push(pattern.clone());
        }
        expanded
            .paths
            .extend(matched.iter().filter_map(|path| relative_path(root, path)));
    }

    tracing::debug!(
        patterns = patterns.len(),
        matched = expanded.paths.len(),
        "Expanded excludes"
    );
    Ok(expanded)
}

fn readable(paths: glob::Paths) -> impl Iterator<Item = PathBuf> {
    paths.filter_map(|entry| match entry {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping unreadable path while expanding excludes");
            None
        }
    })
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let segments = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(segments.join("/"))
}

fn progress_bar(len: u64) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    bar
}

fn progress_callback(bar: ProgressBar) -> ProgressFn {
    Arc::new(move |task: &TransferTask, error: Option<&Error>| {
        bar.inc(1);
        match error {
            Some(e) => bar.println(format!("✗ {}: {e}", task.relative_path)),
            None => bar.set_message(task.relative_path.clone()),
        }
    })
}
