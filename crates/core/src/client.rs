//! Client facade over a transfer port
//!
//! Single-object operations here are thin pass-throughs; errors propagate
//! to the caller unchanged. The local bridge lives in [`crate::bridge`] and
//! directory sync in [`crate::sync`].

use std::path::Path;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};

use crate::config::TransferConfig;
use crate::error::Result;
use crate::location::Location;
use crate::port::{ByteStream, LocationStream, ObjectInfo, TransferPort};

/// Object store client
///
/// Cheap to clone; clones share the same port.
#[derive(Clone)]
pub struct Client {
    pub(crate) port: Arc<dyn TransferPort>,
    pub(crate) config: TransferConfig,
}

impl Client {
    /// Create a client, rejecting a zero chunk size or concurrency
    pub fn new(port: Arc<dyn TransferPort>, config: TransferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { port, config })
    }

    /// Create a client with the default transfer settings
    pub fn with_defaults(port: Arc<dyn TransferPort>) -> Self {
        Self {
            port,
            config: TransferConfig::default(),
        }
    }

    pub fn port(&self) -> &Arc<dyn TransferPort> {
        &self.port
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Stream an object's body
    pub async fn open_read(&self, location: &Location) -> Result<ByteStream> {
        tracing::debug!(location = %location, "Opening object stream");
        self.port.get_stream(location).await
    }

    /// Read a whole object into memory
    pub async fn read(&self, location: &Location) -> Result<Bytes> {
        let body = self.open_read(location).await?;
        let buf = body
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        Ok(buf.freeze())
    }

    /// Store a streamed body
    pub async fn put_stream(&self, location: &Location, body: ByteStream) -> Result<()> {
        tracing::debug!(location = %location, "Writing object stream");
        self.port.put_stream(location, body).await
    }

    /// Store an in-memory body
    pub async fn write(&self, location: &Location, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        let body = futures::stream::once(async move { Ok(data) }).boxed();
        self.put_stream(location, body).await
    }

    pub async fn exists(&self, location: &Location) -> Result<bool> {
        self.port.exists(location).await
    }

    pub async fn stat(&self, location: &Location) -> Result<ObjectInfo> {
        self.port.stat(location).await
    }

    pub async fn copy(&self, src: &Location, dst: &Location) -> Result<()> {
        tracing::debug!(src = %src, dst = %dst, "Copying object");
        self.port.copy(src, dst).await
    }

    pub async fn delete(&self, location: &Location) -> Result<()> {
        tracing::debug!(location = %location, "Deleting object");
        self.port.delete(location).await
    }

    /// Lazily list locations under a prefix
    pub fn list(&self, prefix: &Location, recursive: bool) -> LocationStream {
        self.port.list(prefix, recursive)
    }

    /// Upload a local file directly with the configured chunk size
    pub async fn upload_file(&self, source: &Path, destination: &Location) -> Result<()> {
        tracing::debug!(
            source = %source.display(),
            destination = %destination,
            chunk_size = self.config.chunk_size,
            "Uploading file"
        );
        self.port
            .multipart_put(source, destination, self.config.chunk_size)
            .await
    }

    /// Download an object directly into a local file with the configured chunk size
    pub async fn download_file(&self, source: &Location, destination: &Path) -> Result<u64> {
        tracing::debug!(
            source = %source,
            destination = %destination.display(),
            chunk_size = self.config.chunk_size,
            "Downloading file"
        );
        self.port
            .multipart_get(source, destination, self.config.chunk_size)
            .await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
