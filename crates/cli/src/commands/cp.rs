//! cp command - Copy between local files and the store
//!
//! Uploads and downloads go through the port's chunked transfer path with
//! the configured chunk size. A copy between two remote locations is a
//! server-side copy.

use std::path::{Path, PathBuf};

use clap::Args;
use s3p_core::{Client, Location};
use serde::Serialize;

use super::{is_remote, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, human_size};

/// Copy between local files and the store, or within the store
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source: local file or s3://bucket/key
    pub source: String,

    /// Target: local path or s3://bucket/key (a trailing `/` keeps the file name)
    pub target: String,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    source: String,
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

#[derive(Debug, PartialEq)]
enum Transfer {
    Upload(PathBuf, Location),
    Download(Location, PathBuf),
    Remote(Location, Location),
}

pub async fn execute(args: CpArgs, client: &Client, formatter: &Formatter) -> ExitCode {
    let transfer = match resolve(&args.source, &args.target) {
        Ok(transfer) => transfer,
        Err(message) => {
            formatter.error(&message);
            return ExitCode::UsageError;
        }
    };

    let output = match &transfer {
        Transfer::Upload(source, target) => {
            let size = match tokio::fs::metadata(source).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    formatter.error(&format!("Cannot read {}: {e}", source.display()));
                    return ExitCode::NotFound;
                }
            };
            if let Err(e) = client.upload_file(source, target).await {
                return report(formatter, &format!("Failed to upload to {target}"), &e);
            }
            CpOutput {
                source: source.display().to_string(),
                target: target.to_string(),
                size_bytes: Some(size),
            }
        }
        Transfer::Download(source, target) => match client.download_file(source, target).await {
            Ok(size) => CpOutput {
                source: source.to_string(),
                target: target.display().to_string(),
                size_bytes: Some(size),
            },
            Err(e) => return report(formatter, &format!("Failed to download {source}"), &e),
        },
        Transfer::Remote(source, target) => match client.copy(source, target).await {
            Ok(()) => CpOutput {
                source: source.to_string(),
                target: target.to_string(),
                size_bytes: None,
            },
            Err(e) => return report(formatter, &format!("Failed to copy {source}"), &e),
        },
    };

    if formatter.is_json() {
        formatter.json(&output);
    } else {
        let size = output
            .size_bytes
            .map(|s| format!(" ({})", human_size(s)))
            .unwrap_or_default();
        formatter.success(&format!("{} -> {}{size}", output.source, output.target));
    }
    ExitCode::Success
}

/// Work out the transfer direction and the final object or file name
fn resolve(source: &str, target: &str) -> Result<Transfer, String> {
    let parse = |arg: &str| Location::parse(arg).map_err(|e| e.to_string());

    match (is_remote(source), is_remote(target)) {
        (false, true) => {
            let source = PathBuf::from(source);
            let target = parse(target)?;
            let target = if target.is_dir_like() {
                let name = source
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| format!("'{}' has no file name", source.display()))?;
                target.child(name)
            } else {
                target
            };
            Ok(Transfer::Upload(source, target))
        }
        (true, false) => {
            let source = parse(source)?;
            if source.is_dir_like() {
                return Err(format!("'{source}' is a prefix; use sync for directories"));
            }
            let target = local_target(Path::new(target), source.name());
            Ok(Transfer::Download(source, target))
        }
        (true, true) => {
            let source = parse(source)?;
            let target = parse(target)?;
            let target = if target.is_dir_like() {
                target.child(source.name())
            } else {
                target
            };
            Ok(Transfer::Remote(source, target))
        }
        (false, false) => Err("at least one of source and target must be remote".to_string()),
    }
}

/// Download into a directory keeps the object's name
fn local_target(target: &Path, name: &str) -> PathBuf {
    let as_dir = target.is_dir() || target.to_string_lossy().ends_with(std::path::MAIN_SEPARATOR);
    if as_dir {
        target.join(name)
    } else {
        target.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{memory_client, quiet_formatter};
    use tempfile::TempDir;

    fn loc(s: &str) -> Location {
        Location::parse(s).unwrap()
    }

    #[test]
    fn test_resolve_upload_into_prefix() {
        let transfer = resolve("dir/report.csv", "s3://b/reports/").unwrap();
        assert_eq!(
            transfer,
            Transfer::Upload(
                PathBuf::from("dir/report.csv"),
                loc("s3://b/reports/report.csv")
            )
        );
    }

    #[test]
    fn test_resolve_remote_copy_keeps_explicit_key() {
        let transfer = resolve("s3://a/x.bin", "s3://b/y.bin").unwrap();
        assert_eq!(transfer, Transfer::Remote(loc("s3://a/x.bin"), loc("s3://b/y.bin")));
    }

    #[test]
    fn test_resolve_rejects_local_to_local() {
        assert!(resolve("a.txt", "b.txt").is_err());
        assert!(resolve("s3://b/prefix/", "out").is_err());
    }

    #[tokio::test]
    async fn test_cp_round_trip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("data.bin");
        std::fs::write(&source, vec![7u8; 100]).unwrap();
        let (store, client) = memory_client();
        let formatter = quiet_formatter();

        let upload = CpArgs {
            source: source.display().to_string(),
            target: "s3://b/in/".to_string(),
        };
        assert_eq!(execute(upload, &client, &formatter).await, ExitCode::Success);
        assert_eq!(store.object(&loc("s3://b/in/data.bin")).unwrap().len(), 100);

        let download = CpArgs {
            source: "s3://b/in/data.bin".to_string(),
            target: dir.path().display().to_string(),
        };
        std::fs::remove_file(&source).unwrap();
        assert_eq!(execute(download, &client, &formatter).await, ExitCode::Success);
        assert_eq!(std::fs::read(&source).unwrap(), vec![7u8; 100]);
    }

    #[tokio::test]
    async fn test_cp_missing_local_source() {
        let (_, client) = memory_client();
        let args = CpArgs {
            source: "/definitely/not/here.txt".to_string(),
            target: "s3://b/k".to_string(),
        };
        assert_eq!(
            execute(args, &client, &quiet_formatter()).await,
            ExitCode::NotFound
        );
    }
}
