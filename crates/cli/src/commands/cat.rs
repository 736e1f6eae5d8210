//! cat command - Write an object's contents to stdout

use clap::Args;
use futures::StreamExt;
use s3p_core::{Client, Location, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{parse_location, report};
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Write an object's contents to stdout
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object to print (s3://bucket/key)
    pub location: String,
}

pub async fn execute(args: CatArgs, client: &Client, formatter: &Formatter) -> ExitCode {
    let location = match parse_location(&args.location, formatter) {
        Ok(location) => location,
        Err(code) => return code,
    };

    let mut stdout = tokio::io::stdout();
    match stream_to(client, &location, &mut stdout).await {
        Ok(bytes) => {
            tracing::debug!(location = %location, bytes, "Streamed object to stdout");
            ExitCode::Success
        }
        Err(e) => report(formatter, &format!("Failed to read {location}"), &e),
    }
}

/// Copy the object body chunk by chunk into `writer`
async fn stream_to<W>(client: &Client, location: &Location, writer: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut body = client.open_read(location).await?;
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}
