//! Part arithmetic for chunked transfers

use s3p_core::{Error, Result};

/// S3 rejects multipart uploads with more parts than this
pub const MAX_PARTS: u64 = 10_000;

/// Inclusive byte ranges covering `size` bytes in `chunk_size` steps
pub fn byte_ranges(size: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk_size = chunk_size.max(1);
    (0..size)
        .step_by(chunk_size as usize)
        .map(|start| (start, (start + chunk_size).min(size) - 1))
        .collect()
}

/// Number of parts an upload of `size` bytes needs
///
/// Errors when the chunk size would exceed the service part limit.
pub fn part_count(size: u64, chunk_size: u64) -> Result<u64> {
    let count = size.div_ceil(chunk_size.max(1));
    if count > MAX_PARTS {
        return Err(Error::InvalidConfig(format!(
            "chunk size {chunk_size} needs {count} parts for {size} bytes (limit {MAX_PARTS})"
        )));
    }
    Ok(count)
}

/// `Range` header value for an inclusive byte range
pub fn range_header((start, end): (u64, u64)) -> String {
    format!("bytes={start}-{end}")
}

pub fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// `If-Match` value pinning ranged reads to one object version
pub fn if_match_header(etag: &str) -> String {
    format!("\"{}\"", trim_etag(etag))
}
