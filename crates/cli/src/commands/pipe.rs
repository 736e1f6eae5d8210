//! pipe command - Stream stdin into an object
//!
//! Input is staged in a scratch file through the local bridge and uploaded
//! only once stdin reaches EOF without error. An interrupted or failed read
//! leaves the remote object untouched.

use clap::Args;
use s3p_core::{Client, Error, Location, Result};
use tokio::io::{AsyncRead, AsyncWriteExt};

use super::{parse_location, report};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, human_size};

/// Stream stdin into an object, publishing only on success
#[derive(Args, Debug)]
pub struct PipeArgs {
    /// Object to write (s3://bucket/key)
    pub location: String,

    /// Publish even when stdin is empty
    #[arg(long)]
    pub allow_empty: bool,
}

pub async fn execute(args: PipeArgs, client: &Client, formatter: &Formatter) -> ExitCode {
    let location = match parse_location(&args.location, formatter) {
        Ok(location) => location,
        Err(code) => return code,
    };
    if location.is_dir_like() {
        formatter.error(&format!("'{location}' is a prefix, not an object"));
        return ExitCode::UsageError;
    }

    let mut stdin = tokio::io::stdin();
    match pipe_from(client, &location, &mut stdin, args.allow_empty).await {
        Ok(bytes) => {
            formatter.success(&format!("Wrote {} to {location}", human_size(bytes)));
            ExitCode::Success
        }
        Err(e) => report(formatter, &format!("Failed to write {location}"), &e),
    }
}

/// Stage everything `reader` yields and publish it to `location`
async fn pipe_from<R>(
    client: &Client,
    location: &Location,
    reader: &mut R,
    allow_empty: bool,
) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    client
        .with_local_write(location, |path| async move {
            let mut file = tokio::fs::File::create(&path).await?;
            let copied = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            if copied == 0 && !allow_empty {
                return Err(Error::General(
                    "no input on stdin (use --allow-empty to publish an empty object)".to_string(),
                ));
            }
            Ok(copied)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::memory_client_with;
    use s3p_core::TransferConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_pipe_publishes_input() {
        let scratch = TempDir::new().unwrap();
        let (store, client) =
            memory_client_with(TransferConfig::default().with_scratch_dir(scratch.path()));
        let location = Location::parse("s3://b/from-stdin.txt").unwrap();

        let mut input: &[u8] = b"line one\nline two\n";
        let bytes = pipe_from(&client, &location, &mut input, false).await.unwrap();

        assert_eq!(bytes, 18);
        assert_eq!(store.object(&location).unwrap(), &b"line one\nline two\n"[..]);
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_pipe_empty_input_not_published() {
        let scratch = TempDir::new().unwrap();
        let (store, client) =
            memory_client_with(TransferConfig::default().with_scratch_dir(scratch.path()));
        let location = Location::parse("s3://b/empty").unwrap();

        let mut input: &[u8] = b"";
        let err = pipe_from(&client, &location, &mut input, false).await.unwrap_err();

        assert!(matches!(err, Error::General(_)));
        assert_eq!(store.put_count(&location), 0);
        assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_pipe_allow_empty() {
        let scratch = TempDir::new().unwrap();
        let (store, client) =
            memory_client_with(TransferConfig::default().with_scratch_dir(scratch.path()));
        let location = Location::parse("s3://b/empty").unwrap();

        let mut input: &[u8] = b"";
        pipe_from(&client, &location, &mut input, true).await.unwrap();
        assert_eq!(store.object(&location).unwrap().len(), 0);
    }
}
