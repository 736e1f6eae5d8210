//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the `TransferPort` trait from s3p-core.
//! Every SDK call runs inside `retry_with_backoff`, so errors returned from
//! here have already exhausted the retry policy.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_smithy_types::byte_stream::ByteStream as SdkByteStream;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use s3p_core::{
    ByteStream, Error, Location, LocationStream, ObjectInfo, Result, RetryConfig, StoreConfig,
    TransferPort, is_retryable_error, retry_with_backoff,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::parts::{byte_ranges, if_match_header, part_count, range_header, trim_etag};

/// S3 client wrapper
#[derive(Clone)]
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    retry: RetryConfig,
}

impl S3Client {
    /// Create a new S3 client from store settings
    ///
    /// Static keys are used when configured; otherwise the SDK's default
    /// credential chain applies.
    pub async fn new(store: &StoreConfig, retry: RetryConfig) -> Result<Self> {
        store.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(store.region.clone()));

        if let Some((access_key, secret_key)) = store.static_credentials()? {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                None, // session token
                None, // expiry
                "s3p-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = &store.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        let config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(store.path_style)
            .build();

        tracing::debug!(
            endpoint = store.endpoint.as_deref().unwrap_or("aws"),
            region = %store.region,
            path_style = store.path_style,
            "Created S3 client"
        );

        Ok(Self::from_client(
            aws_sdk_s3::Client::from_conf(s3_config),
            retry,
        ))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(inner: aws_sdk_s3::Client, retry: RetryConfig) -> Self {
        Self { inner, retry }
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    async fn head(&self, location: &Location) -> Result<ObjectInfo> {
        let response = retry_with_backoff(
            &self.retry,
            "head_object",
            || async move {
                self.inner
                    .head_object()
                    .bucket(location.container())
                    .key(location.path())
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, location))
            },
            is_retryable_error,
        )
        .await?;

        let mut info = ObjectInfo::new(
            location.clone(),
            response.content_length().unwrap_or(0).max(0) as u64,
        );
        info.last_modified = response
            .last_modified()
            .and_then(|dt| jiff::Timestamp::from_second(dt.secs()).ok());
        info.etag = response.e_tag().map(trim_etag);
        info.content_type = response.content_type().map(str::to_string);
        Ok(info)
    }

    async fn put_bytes(&self, location: &Location, data: Bytes, content_type: &str) -> Result<()> {
        retry_with_backoff(
            &self.retry,
            "put_object",
            || {
                let body = SdkByteStream::from(data.clone());
                async move {
                    self.inner
                        .put_object()
                        .bucket(location.container())
                        .key(location.path())
                        .content_type(content_type)
                        .body(body)
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(e, location))
                }
            },
            is_retryable_error,
        )
        .await?;
        Ok(())
    }

    async fn upload_parts(
        &self,
        file: &mut tokio::fs::File,
        location: &Location,
        upload_id: &str,
        parts: u64,
        chunk_size: u64,
    ) -> Result<Vec<CompletedPart>> {
        let mut completed = Vec::with_capacity(parts as usize);

        for part_number in 1..=parts as i32 {
            let chunk = read_chunk(file, chunk_size).await?;
            let response = retry_with_backoff(
                &self.retry,
                "upload_part",
                || {
                    let body = SdkByteStream::from(chunk.clone());
                    async move {
                        self.inner
                            .upload_part()
                            .bucket(location.container())
                            .key(location.path())
                            .upload_id(upload_id)
                            .part_number(part_number)
                            .body(body)
                            .send()
                            .await
                            .map_err(|e| map_sdk_error(e, location))
                    }
                },
                is_retryable_error,
            )
            .await?;

            tracing::trace!(location = %location, part_number, "Uploaded part");
            completed.push(
                CompletedPart::builder()
                    .set_e_tag(response.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
        }

        Ok(completed)
    }
}

/// Map an SDK failure to the s3p error taxonomy
fn map_sdk_error<E>(error: SdkError<E>, location: &Location) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    if is_not_found(&error) {
        return Error::NotFound(location.to_string());
    }
    let message = format!("{location}: {}", format_sdk_error(&error));
    if is_transient(&error) {
        Error::Unavailable(message)
    } else {
        Error::Transfer(message)
    }
}

/// Classify from the SDK's structured error, never from message text
fn is_transient<E: ProvideErrorMetadata>(error: &SdkError<E>) -> bool {
    match error {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service_err) => {
            transient_service_error(service_err.raw().status().as_u16(), error.code())
        }
        _ => false,
    }
}

fn transient_service_error(status: u16, code: Option<&str>) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
        || matches!(
            code,
            Some(
                "SlowDown"
                    | "Throttling"
                    | "ThrottlingException"
                    | "RequestTimeout"
                    | "RequestTimeTooSkewed"
                    | "InternalError"
                    | "ServiceUnavailable"
            )
        )
}

fn is_not_found<E: ProvideErrorMetadata>(error: &SdkError<E>) -> bool {
    if let SdkError::ServiceError(service_err) = error
        && service_err.raw().status().as_u16() == 404
    {
        return true;
    }
    matches!(
        error.code(),
        Some("NoSuchKey" | "NotFound" | "NoSuchBucket")
    )
}

/// Format an SDK error into a detailed message
fn format_sdk_error<E>(error: &SdkError<E>) -> String
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    match error {
        SdkError::ServiceError(service_err) => {
            let err = service_err.err();
            let mut msg = format!("Service error: {err}");
            if let Some(code) = err.code() {
                msg.push_str(&format!(" (code: {code})"));
            }
            msg
        }
        SdkError::ConstructionFailure(err) => format!("Request construction failed: {err:?}"),
        SdkError::TimeoutError(_) => "Request timeout".to_string(),
        SdkError::DispatchFailure(err) => format!("Network dispatch error: {err:?}"),
        SdkError::ResponseError(err) => format!("Response error: {err:?}"),
        _ => error.to_string(),
    }
}

/// Read up to `chunk_size` bytes, fewer only at end of file
async fn read_chunk(file: &mut tokio::fs::File, chunk_size: u64) -> Result<Bytes> {
    let mut buf = Vec::with_capacity(chunk_size.min(64 * 1024 * 1024) as usize);
    (&mut *file).take(chunk_size).read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

enum Page {
    Next(Option<String>),
    Done,
}

#[async_trait]
impl TransferPort for S3Client {
    async fn get_stream(&self, location: &Location) -> Result<ByteStream> {
        let response = retry_with_backoff(
            &self.retry,
            "get_object",
            || async move {
                self.inner
                    .get_object()
                    .bucket(location.container())
                    .key(location.path())
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, location))
            },
            is_retryable_error,
        )
        .await?;

        let target = location.to_string();
        let body = futures::stream::unfold(response.body, move |mut body| {
            let target = target.clone();
            async move {
                body.next().await.map(|chunk| {
                    let chunk = chunk.map_err(|e| Error::Transfer(format!("{target}: {e}")));
                    (chunk, body)
                })
            }
        });
        Ok(body.boxed())
    }

    async fn put_stream(&self, location: &Location, body: ByteStream) -> Result<()> {
        let data = body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        self.put_bytes(location, Bytes::from(data), "application/octet-stream")
            .await
    }

    fn list(&self, prefix: &Location, recursive: bool) -> LocationStream {
        let client = self.inner.clone();
        let retry = self.retry.clone();
        let prefix = prefix.clone();

        let pages = futures::stream::try_unfold(Page::Next(None), move |page| {
            let client = client.clone();
            let retry = retry.clone();
            let prefix = prefix.clone();
            async move {
                let token = match page {
                    Page::Done => return Ok::<_, Error>(None),
                    Page::Next(token) => token,
                };

                let response = retry_with_backoff(
                    &retry,
                    "list_objects_v2",
                    || {
                        let mut request = client
                            .list_objects_v2()
                            .bucket(prefix.container())
                            .set_continuation_token(token.clone());
                        if !prefix.path().is_empty() {
                            request = request.prefix(prefix.path());
                        }
                        if !recursive {
                            request = request.delimiter("/");
                        }
                        let prefix = &prefix;
                        async move { request.send().await.map_err(|e| map_sdk_error(e, prefix)) }
                    },
                    is_retryable_error,
                )
                .await?;

                let mut items: Vec<Location> = response
                    .common_prefixes()
                    .iter()
                    .filter_map(|p| p.prefix())
                    .map(|p| prefix.with_path(p))
                    .collect();
                items.extend(
                    response
                        .contents()
                        .iter()
                        .filter_map(|object| object.key())
                        .map(|key| prefix.with_path(key)),
                );

                let next = match response.next_continuation_token() {
                    Some(token) if response.is_truncated().unwrap_or(false) => {
                        Page::Next(Some(token.to_string()))
                    }
                    _ => Page::Done,
                };
                Ok(Some((items, next)))
            }
        });

        pages
            .map_ok(|items| futures::stream::iter(items.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }

    async fn exists(&self, location: &Location) -> Result<bool> {
        match self.head(location).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn stat(&self, location: &Location) -> Result<ObjectInfo> {
        self.head(location).await
    }

    async fn copy(&self, src: &Location, dst: &Location) -> Result<()> {
        // Build copy source: bucket/key
        let copy_source = format!("{}/{}", src.container(), src.path());

        retry_with_backoff(
            &self.retry,
            "copy_object",
            || {
                let copy_source = &copy_source;
                async move {
                    self.inner
                        .copy_object()
                        .copy_source(copy_source)
                        .bucket(dst.container())
                        .key(dst.path())
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(e, src))
                }
            },
            is_retryable_error,
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, location: &Location) -> Result<()> {
        retry_with_backoff(
            &self.retry,
            "delete_object",
            || async move {
                self.inner
                    .delete_object()
                    .bucket(location.container())
                    .key(location.path())
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, location))
            },
            is_retryable_error,
        )
        .await?;
        Ok(())
    }

    async fn multipart_get(
        &self,
        location: &Location,
        dest: &Path,
        chunk_size: u64,
    ) -> Result<u64> {
        let info = self.head(location).await?;
        let size = info.size_bytes;
        // Every range must come from the object version the head saw
        let if_match = info.etag.as_deref().map(if_match_header);
        let mut file = tokio::fs::File::create(dest).await?;

        for range in byte_ranges(size, chunk_size) {
            let header = range_header(range);
            let part = retry_with_backoff(
                &self.retry,
                "get_object_range",
                || {
                    let header = &header;
                    let if_match = if_match.clone();
                    async move {
                        let response = self
                            .inner
                            .get_object()
                            .bucket(location.container())
                            .key(location.path())
                            .range(header)
                            .set_if_match(if_match)
                            .send()
                            .await
                            .map_err(|e| map_sdk_error(e, location))?;
                        response
                            .body
                            .collect()
                            .await
                            .map(|data| data.into_bytes())
                            .map_err(|e| Error::Unavailable(format!("{location}: {e}")))
                    }
                },
                is_retryable_error,
            )
            .await?;
            file.write_all(&part).await?;
        }

        file.flush().await?;
        tracing::debug!(location = %location, size, chunk_size, "Downloaded object");
        Ok(size)
    }

    async fn multipart_put(
        &self,
        source: &Path,
        location: &Location,
        chunk_size: u64,
    ) -> Result<()> {
        let mut file = tokio::fs::File::open(source).await?;
        let size = file.metadata().await?.len();
        let content_type = guess_content_type(source);

        if size <= chunk_size {
            let data = read_chunk(&mut file, chunk_size).await?;
            self.put_bytes(location, data, &content_type).await?;
            tracing::debug!(location = %location, size, "Uploaded object in one request");
            return Ok(());
        }

        let parts = part_count(size, chunk_size)?;
        let created = retry_with_backoff(
            &self.retry,
            "create_multipart_upload",
            || {
                let content_type = &content_type;
                async move {
                    self.inner
                        .create_multipart_upload()
                        .bucket(location.container())
                        .key(location.path())
                        .content_type(content_type)
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(e, location))
                }
            },
            is_retryable_error,
        )
        .await?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::Transfer(format!("{location}: missing upload id")))?
            .to_string();

        let completed = match self
            .upload_parts(&mut file, location, &upload_id, parts, chunk_size)
            .await
        {
            Ok(completed) => completed,
            Err(e) => {
                if let Err(abort) = self
                    .inner
                    .abort_multipart_upload()
                    .bucket(location.container())
                    .key(location.path())
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        location = %location,
                        error = %format_sdk_error(&abort),
                        "Failed to abort multipart upload"
                    );
                }
                return Err(e);
            }
        };

        let manifest = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        retry_with_backoff(
            &self.retry,
            "complete_multipart_upload",
            || {
                let manifest = manifest.clone();
                let upload_id = &upload_id;
                async move {
                    self.inner
                        .complete_multipart_upload()
                        .bucket(location.container())
                        .key(location.path())
                        .upload_id(upload_id)
                        .multipart_upload(manifest)
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(e, location))
                }
            },
            is_retryable_error,
        )
        .await?;

        tracing::debug!(location = %location, size, parts, chunk_size, "Completed multipart upload");
        Ok(())
    }
}
