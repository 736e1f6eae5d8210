//! Local bridge: stage a remote object as a temporary local file
//!
//! Read mode downloads the object into a scratch file and deletes the file
//! when the guard is released. Write mode hands out an empty scratch file;
//! [`LocalWrite::commit`] uploads it and deletes it, while dropping or
//! discarding the guard deletes it without uploading. A partially written
//! file is never published.
//!
//! Scratch files are named `s3p-<random>` inside the configured scratch
//! directory, so concurrent bridges never share a path.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempPath;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::location::Location;
use crate::port::TransferPort;

const SCRATCH_PREFIX: &str = "s3p-";

/// A downloaded copy of a remote object
///
/// The scratch file is removed on [`close`](Self::close) or drop.
#[derive(Debug)]
pub struct LocalRead {
    path: TempPath,
    location: Location,
    size_bytes: u64,
}

impl LocalRead {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Bytes downloaded into the scratch file
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Open the scratch file for reading
    pub async fn open(&self) -> Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| Error::local_resource("open scratch file", e))
    }

    /// Delete the scratch file, surfacing any cleanup error
    pub fn close(self) -> Result<()> {
        let path = self.path.to_path_buf();
        self.path.close().map_err(|e| {
            Error::local_resource(&format!("remove scratch file {}", path.display()), e)
        })
    }
}

/// A scratch file that is published to the store on commit
#[must_use = "dropping a LocalWrite discards its contents without uploading"]
pub struct LocalWrite {
    path: TempPath,
    location: Location,
    port: Arc<dyn TransferPort>,
    chunk_size: u64,
}

impl LocalWrite {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Open the scratch file for writing, truncating earlier content
    pub async fn open(&self) -> Result<tokio::fs::File> {
        tokio::fs::File::create(&self.path)
            .await
            .map_err(|e| Error::local_resource("open scratch file", e))
    }

    /// Upload the scratch file, then delete it
    ///
    /// The file is deleted even when the upload fails; the upload error
    /// takes precedence over a cleanup error.
    pub async fn commit(self) -> Result<()> {
        tracing::debug!(
            location = %self.location,
            scratch = %self.path.display(),
            chunk_size = self.chunk_size,
            "Publishing scratch file"
        );
        let upload = self
            .port
            .multipart_put(&self.path, &self.location, self.chunk_size)
            .await;
        let cleanup = remove_scratch(self.path);

        upload?;
        cleanup
    }

    /// Delete the scratch file without uploading
    pub fn discard(self) -> Result<()> {
        tracing::debug!(location = %self.location, "Discarding scratch file");
        remove_scratch(self.path)
    }
}

impl std::fmt::Debug for LocalWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWrite")
            .field("path", &self.path)
            .field("location", &self.location)
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

fn remove_scratch(path: TempPath) -> Result<()> {
    let display = path.display().to_string();
    path.close()
        .map_err(|e| Error::local_resource(&format!("remove scratch file {display}"), e))
}

impl Client {
    fn allocate_scratch(&self) -> Result<TempPath> {
        let dir = self.config.scratch_dir();
        let file = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempfile_in(&dir)
            .map_err(|e| {
                Error::local_resource(&format!("create scratch file in {}", dir.display()), e)
            })?;
        Ok(file.into_temp_path())
    }

    /// Download `location` into a fresh scratch file
    pub async fn open_local_read(&self, location: &Location) -> Result<LocalRead> {
        let path = self.allocate_scratch()?;
        tracing::debug!(
            location = %location,
            scratch = %path.display(),
            chunk_size = self.config.chunk_size,
            "Staging object for read"
        );

        match self
            .port
            .multipart_get(location, &path, self.config.chunk_size)
            .await
        {
            Ok(size_bytes) => Ok(LocalRead {
                path,
                location: location.clone(),
                size_bytes,
            }),
            Err(e) => {
                if let Err(cleanup) = remove_scratch(path) {
                    tracing::warn!(error = %cleanup, "Failed to remove scratch file");
                }
                Err(e)
            }
        }
    }

    /// Allocate an empty scratch file that will be published to `location`
    pub fn open_local_write(&self, location: &Location) -> Result<LocalWrite> {
        let path = self.allocate_scratch()?;
        tracing::debug!(
            location = %location,
            scratch = %path.display(),
            "Staging scratch file for write"
        );
        Ok(LocalWrite {
            path,
            location: location.clone(),
            port: self.port.clone(),
            chunk_size: self.config.chunk_size,
        })
    }

    /// Run `body` against a downloaded copy of `location`
    ///
    /// The scratch file is deleted afterwards whatever `body` returns.
    pub async fn with_local_read<T, E, F, Fut>(
        &self,
        location: &Location,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        let staged = self.open_local_read(location).await?;
        let outcome = body(staged.path().to_path_buf()).await;
        let cleanup = staged.close();

        match outcome {
            Ok(value) => {
                cleanup?;
                Ok(value)
            }
            Err(e) => {
                if let Err(cleanup) = cleanup {
                    tracing::warn!(error = %cleanup, "Failed to remove scratch file");
                }
                Err(e)
            }
        }
    }

    /// Run `body` against an empty scratch file and publish it to `location`
    ///
    /// The file is uploaded only when `body` returns `Ok`. On `Err` (or a
    /// panic) it is deleted without any put reaching the store.
    pub async fn with_local_write<T, E, F, Fut>(
        &self,
        location: &Location,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        let staged = self.open_local_write(location)?;

        match body(staged.path().to_path_buf()).await {
            Ok(value) => {
                staged.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(location = %location, "Write scope failed, not publishing");
                if let Err(cleanup) = staged.discard() {
                    tracing::warn!(error = %cleanup, "Failed to remove scratch file");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferConfig;
    use crate::memory::MemoryStore;
    use crate::port::MockTransferPort;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn loc(s: &str) -> Location {
        Location::parse(s).unwrap()
    }

    fn setup() -> (TempDir, Arc<MemoryStore>, Client) {
        let scratch = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let config = TransferConfig::default()
            .with_chunk_size(4)
            .with_scratch_dir(scratch.path());
        let client = Client::new(store.clone(), config).unwrap();
        (scratch, store, client)
    }

    fn scratch_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_read_stages_and_cleans_up() {
        let (scratch, store, client) = setup();
        let l = loc("s3://bucket/report.csv");
        store.insert(&l, "a,b,c\n1,2,3\n");

        let staged = client.open_local_read(&l).await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.starts_with(scratch.path()));
        assert_eq!(staged.size_bytes(), 12);

        let mut content = String::new();
        staged
            .open()
            .await
            .unwrap()
            .read_to_string(&mut content)
            .await
            .unwrap();
        assert_eq!(content, "a,b,c\n1,2,3\n");

        staged.close().unwrap();
        assert!(!path.exists());
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_read_unused_handle_is_removed_on_drop() {
        let (scratch, store, client) = setup();
        let l = loc("s3://bucket/k");
        store.insert(&l, "x");

        let staged = client.open_local_read(&l).await.unwrap();
        let path = staged.path().to_path_buf();
        drop(staged);
        assert!(!path.exists());
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_read_missing_object_cleans_up() {
        let (scratch, _store, client) = setup();
        let err = client.open_local_read(&loc("s3://bucket/missing")).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_read_transfer_failure_cleans_up() {
        let scratch = TempDir::new().unwrap();
        let seen = Arc::new(Mutex::new(None::<PathBuf>));
        let seen_in_mock = seen.clone();

        let mut port = MockTransferPort::new();
        port.expect_multipart_get()
            .times(1)
            .returning(move |_, dest, _| {
                std::fs::write(dest, b"partial").unwrap();
                *seen_in_mock.lock().unwrap() = Some(dest.to_path_buf());
                Err(Error::Transfer("connection reset".to_string()))
            });

        let client = Client::new(
            Arc::new(port),
            TransferConfig::default().with_scratch_dir(scratch.path()),
        )
        .unwrap();

        let err = client.open_local_read(&loc("s3://bucket/k")).await.unwrap_err();
        assert!(matches!(err, Error::Transfer(_)));

        let path = seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_with_local_read_runs_body() {
        let (scratch, store, client) = setup();
        let l = loc("s3://bucket/k");
        store.insert(&l, "contents");

        let text = client
            .with_local_read(&l, |path| async move {
                Ok::<_, Error>(tokio::fs::read_to_string(path).await?)
            })
            .await
            .unwrap();
        assert_eq!(text, "contents");
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_write_commit_uploads_and_cleans_up() {
        let (scratch, store, client) = setup();
        let l = loc("s3://bucket/out.txt");

        let staged = client.open_local_write(&l).unwrap();
        let path = staged.path().to_path_buf();
        let mut file = staged.open().await.unwrap();
        file.write_all(b"chunked body").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        staged.commit().await.unwrap();
        assert!(!path.exists());
        assert!(scratch_is_empty(&scratch));
        assert_eq!(store.object(&l).unwrap(), &b"chunked body"[..]);
        assert_eq!(store.put_count(&l), 1);
    }

    #[tokio::test]
    async fn test_write_drop_does_not_publish() {
        let (scratch, store, client) = setup();
        let l = loc("s3://bucket/out.txt");

        let staged = client.open_local_write(&l).unwrap();
        std::fs::write(staged.path(), "half").unwrap();
        drop(staged);

        assert!(scratch_is_empty(&scratch));
        assert_eq!(store.put_count(&l), 0);
    }

    #[tokio::test]
    async fn test_with_local_write_success() {
        let (scratch, store, client) = setup();
        let l = loc("s3://bucket/result.json");

        let written = client
            .with_local_write(&l, |path| async move {
                tokio::fs::write(&path, br#"{"ok":true}"#).await?;
                Ok::<_, Error>(path)
            })
            .await
            .unwrap();

        assert!(!written.exists());
        assert!(scratch_is_empty(&scratch));
        assert_eq!(store.object(&l).unwrap(), &br#"{"ok":true}"#[..]);
    }

    #[tokio::test]
    async fn test_with_local_write_error_never_publishes() {
        let (scratch, store, client) = setup();
        let l = loc("s3://bucket/result.json");
        let seen = Arc::new(Mutex::new(None::<PathBuf>));
        let seen_in_body = seen.clone();

        let result: std::result::Result<(), Error> = client
            .with_local_write(&l, |path| async move {
                tokio::fs::write(&path, "partial").await?;
                *seen_in_body.lock().unwrap() = Some(path);
                Err::<(), Error>(Error::General("body failed".to_string()))
            })
            .await;

        assert!(matches!(result, Err(Error::General(_))));
        let path = seen.lock().unwrap().clone().unwrap();
        assert!(!path.exists());
        assert!(scratch_is_empty(&scratch));
        assert_eq!(store.put_count(&l), 0);
        assert!(store.object(&l).is_none());
    }

    #[tokio::test]
    async fn test_with_local_write_upload_failure_still_cleans_up() {
        let (scratch, store, client) = setup();
        let l = loc("s3://bucket/blocked");
        store.fail_on(&l);

        let err = client
            .with_local_write(&l, |path| async move {
                tokio::fs::write(&path, "data").await?;
                Ok::<_, Error>(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transfer(_)));
        assert!(scratch_is_empty(&scratch));
    }

    #[tokio::test]
    async fn test_concurrent_bridges_use_distinct_paths() {
        let (_scratch, _store, client) = setup();
        let a = client.open_local_write(&loc("s3://bucket/same")).unwrap();
        let b = client.open_local_write(&loc("s3://bucket/same")).unwrap();
        assert_ne!(a.path(), b.path());
        a.discard().unwrap();
        b.discard().unwrap();
    }

    #[tokio::test]
    async fn test_missing_scratch_dir_is_local_resource_error() {
        let store = Arc::new(MemoryStore::new());
        let config = TransferConfig::default().with_scratch_dir("/nonexistent/s3p/scratch");
        let client = Client::new(store, config).unwrap();

        let err = client.open_local_write(&loc("s3://bucket/k")).unwrap_err();
        assert!(matches!(err, Error::LocalResource(_)));
    }
}
