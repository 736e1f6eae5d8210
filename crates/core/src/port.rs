//! Transfer port: the capability set s3p needs from an object store
//!
//! Implementations own their retry policy. Every error they return is final
//! from the caller's point of view.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use jiff::Timestamp;
use serde::Serialize;

use crate::error::Result;
use crate::location::Location;

/// Object body as a stream of chunks
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Lazy listing of locations under a prefix
pub type LocationStream = BoxStream<'static, Result<Location>>;

/// Metadata returned by a head request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    pub location: Location,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ObjectInfo {
    pub fn new(location: Location, size_bytes: u64) -> Self {
        Self {
            location,
            size_bytes,
            last_modified: None,
            etag: None,
            content_type: None,
        }
    }
}

/// Object store operations consumed by the client
///
/// `S3Client` in `s3p-s3` talks to a real endpoint; [`crate::memory::MemoryStore`]
/// keeps objects in process.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferPort: Send + Sync {
    /// Stream an object's body
    async fn get_stream(&self, location: &Location) -> Result<ByteStream>;

    /// Store a body under `location`, replacing any existing object
    async fn put_stream(&self, location: &Location, body: ByteStream) -> Result<()>;

    /// List objects under a prefix
    ///
    /// Recursive listings yield every object key under the prefix.
    /// Non-recursive listings yield direct children, with sub-prefixes
    /// reported as locations ending in `/`. The stream is restartable by
    /// calling `list` again.
    fn list(&self, prefix: &Location, recursive: bool) -> LocationStream;

    async fn exists(&self, location: &Location) -> Result<bool>;

    /// Head an object
    async fn stat(&self, location: &Location) -> Result<ObjectInfo>;

    async fn copy(&self, src: &Location, dst: &Location) -> Result<()>;

    async fn delete(&self, location: &Location) -> Result<()>;

    /// Download `location` into the local file at `dest` in `chunk_size` parts
    ///
    /// Returns the number of bytes written. `dest` is created or truncated.
    async fn multipart_get(&self, location: &Location, dest: &Path, chunk_size: u64)
    -> Result<u64>;

    /// Upload the local file at `source` to `location` in `chunk_size` parts
    async fn multipart_put(&self, source: &Path, location: &Location, chunk_size: u64)
    -> Result<()>;
}
