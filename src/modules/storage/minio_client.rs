//! MinIO/S3-compatible storage client
//!
//! Implements [`StorageClient`] for MinIO or any S3-compatible storage
//! service using the rust-s3 crate. Bucket handles are cheap and built per
//! call, so one client serves every bucket the credentials can reach.

use std::collections::HashMap;
use std::io;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use s3::creds::Credentials;
use s3::serde_types::Part;
use s3::{Bucket, BucketConfiguration, Region};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use super::client::{
    BucketInfo, ObjectBody, ObjectItem, ObjectListing, ObjectReader, ObjectWriteResponse,
    StorageClient,
};
use crate::core::config::MinIOConfig;
use crate::core::error::{BoxError, StorageOperationError};
use crate::shared::constants::{DEFAULT_CONTENT_TYPE, LIST_OBJECTS_PAGE_SIZE};

/// MinIO/S3-compatible storage client
#[derive(Debug, Clone)]
pub struct MinIOClient {
    region: Region,
    credentials: Credentials,
    endpoint: String,
    presigned_url_expiry_secs: u32,
}

impl MinIOClient {
    /// Create a new MinIO client from configuration
    ///
    /// No request is sent; connectivity problems surface on the first call.
    pub fn new(config: &MinIOConfig) -> Result<Self, StorageOperationError> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageOperationError::new("create minio credentials failed", e))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        info!(
            "MinIO client initialized for endpoint: {}, region: {}",
            config.endpoint, config.region
        );

        Ok(Self {
            region,
            credentials,
            endpoint: config.endpoint.clone(),
            presigned_url_expiry_secs: config.presigned_url_expiry_secs,
        })
    }

    /// Raw rust-s3 handle for `name`, using path-style URLs
    /// (http://endpoint/bucket instead of http://bucket.endpoint)
    pub fn bucket(&self, name: &str) -> Result<Box<Bucket>, BoxError> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())?;
        Ok(bucket.with_path_style())
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the presigned URL expiry time in seconds
    pub fn presigned_url_expiry_secs(&self) -> u32 {
        self.presigned_url_expiry_secs
    }
}

#[async_trait]
impl StorageClient for MinIOClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, BoxError> {
        Ok(self.bucket(bucket)?.exists().await?)
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), BoxError> {
        let response = Bucket::create_with_path_style(
            bucket,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await?;

        if !response.success() {
            return Err(format!(
                "create bucket '{}' returned {}: {}",
                bucket, response.response_code, response.response_text
            )
            .into());
        }

        debug!("Bucket '{}' created", bucket);
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), BoxError> {
        let status = self.bucket(bucket)?.delete().await?;
        ensure_success("delete bucket", bucket, status)?;

        debug!("Bucket '{}' deleted", bucket);
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BoxError> {
        let response = Bucket::list_buckets(self.region.clone(), self.credentials.clone()).await?;

        Ok(response
            .buckets
            .bucket
            .into_iter()
            .map(|bucket| BucketInfo {
                creation_date: parse_timestamp(&bucket.creation_date),
                name: bucket.name,
            })
            .collect())
    }

    async fn list_objects(&self, bucket: &str) -> Result<ObjectListing, BoxError> {
        let handle = self.bucket(bucket)?;
        Ok(list_pages(*handle))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ObjectBody,
        content_type: Option<String>,
        part_size: usize,
    ) -> Result<ObjectWriteResponse, BoxError> {
        let handle = self.bucket(bucket)?;
        let content_type = content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);

        let etag = upload_body(handle.as_ref(), key, &mut body, content_type, part_size).await?;

        debug!("Uploaded '{}' to bucket '{}'", key, bucket);
        Ok(ObjectWriteResponse {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, BoxError> {
        let response = self.bucket(bucket)?.get_object_stream(key).await?;
        ensure_success("get object", key, response.status_code)?;

        let bytes = response.bytes.map_err(io::Error::other);

        debug!("Opened '{}' from bucket '{}' for reading", key, bucket);
        Ok(Box::pin(StreamReader::new(bytes)))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), BoxError> {
        self.bucket(bucket)?.delete_object(key).await?;

        debug!("Deleted '{}' from bucket '{}'", key, bucket);
        Ok(())
    }

    async fn presigned_get_object_url(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: Option<u32>,
    ) -> Result<String, BoxError> {
        let expiry = expiry_secs.unwrap_or(self.presigned_url_expiry_secs);
        let url = self
            .bucket(bucket)?
            .presign_get(key, expiry, None::<HashMap<String, String>>)
            .await?;
        Ok(url)
    }
}

/// One page of a bucket listing
#[derive(Debug)]
struct ListingPage {
    items: Vec<ObjectItem>,
    /// Continuation token for the next page, `None` on the last page
    next_token: Option<String>,
}

/// Fetches listing pages by continuation token
#[cfg_attr(test, automock)]
#[async_trait]
trait PageSource: Send + Sync {
    async fn fetch_page(&self, continuation_token: Option<String>)
        -> Result<ListingPage, BoxError>;
}

#[async_trait]
impl PageSource for Bucket {
    async fn fetch_page(
        &self,
        continuation_token: Option<String>,
    ) -> Result<ListingPage, BoxError> {
        let (page, _) = self
            .list_page(
                String::new(),
                None,
                continuation_token,
                None,
                Some(LIST_OBJECTS_PAGE_SIZE),
            )
            .await?;

        let next_token = if page.is_truncated {
            page.next_continuation_token
        } else {
            None
        };

        let items = page
            .contents
            .into_iter()
            .map(|object| ObjectItem {
                last_modified: parse_timestamp(&object.last_modified),
                key: object.key,
                size: object.size,
            })
            .collect();

        Ok(ListingPage { items, next_token })
    }
}

enum ListCursor {
    Start,
    Next(String),
    Done,
}

/// Lazily walk every page of `source`, following continuation tokens
fn list_pages<P: PageSource + 'static>(source: P) -> ObjectListing {
    let pages = stream::try_unfold(
        (source, ListCursor::Start),
        |(source, cursor)| async move {
            let token = match cursor {
                ListCursor::Done => return Ok(None),
                ListCursor::Start => None,
                ListCursor::Next(token) => Some(token),
            };

            let page = source.fetch_page(token).await?;
            let next = match page.next_token {
                Some(token) => ListCursor::Next(token),
                None => ListCursor::Done,
            };

            Ok::<_, BoxError>(Some((page.items, (source, next))))
        },
    );

    pages
        .map_ok(|items| stream::iter(items.into_iter().map(Ok::<_, BoxError>)))
        .try_flatten()
        .boxed()
}

/// Destination of an upload: a single PUT or the steps of a multipart upload
#[cfg_attr(test, automock)]
#[async_trait]
trait PartSink: Send + Sync {
    async fn put_single(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<Option<String>, BoxError>;

    /// Returns the upload id
    async fn begin_multipart(&self, key: &str, content_type: &str) -> Result<String, BoxError>;

    async fn put_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<Part, BoxError>;

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<Part>,
    ) -> Result<Option<String>, BoxError>;

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<(), BoxError>;
}

#[async_trait]
impl PartSink for Bucket {
    async fn put_single(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<Option<String>, BoxError> {
        let response = self
            .put_object_with_content_type(key, &data, content_type)
            .await?;
        Ok(header_etag(&response.headers()))
    }

    async fn begin_multipart(&self, key: &str, content_type: &str) -> Result<String, BoxError> {
        let init = self.initiate_multipart_upload(key, content_type).await?;
        Ok(init.upload_id)
    }

    async fn put_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<Part, BoxError> {
        Ok(self
            .put_multipart_chunk(data, key, part_number, upload_id, content_type)
            .await?)
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<Part>,
    ) -> Result<Option<String>, BoxError> {
        let response = self
            .complete_multipart_upload(key, upload_id, parts)
            .await?;
        Ok(extract_xml_etag(&String::from_utf8_lossy(
            response.as_slice(),
        )))
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> Result<(), BoxError> {
        self.abort_upload(key, upload_id).await?;
        Ok(())
    }
}

/// Send `body` to `sink` in `part_size` chunks.
///
/// A body shorter than one part goes out as a single PUT; anything else is a
/// multipart upload, aborted if any step fails.
async fn upload_body<S>(
    sink: &S,
    key: &str,
    body: &mut ObjectBody,
    content_type: &str,
    part_size: usize,
) -> Result<Option<String>, BoxError>
where
    S: PartSink + ?Sized,
{
    let first = read_part(&mut *body, part_size).await?;

    if first.len() < part_size {
        debug!("Single request upload: key={}, size={}", key, first.len());
        return sink.put_single(key, first, content_type).await;
    }

    let upload_id = sink.begin_multipart(key, content_type).await?;
    debug!("Multipart upload started: key={}, upload_id={}", key, upload_id);

    let result = async {
        let parts = upload_parts(
            sink,
            key,
            &upload_id,
            first,
            body,
            content_type,
            part_size,
        )
        .await?;
        let part_count = parts.len();
        let etag = sink.complete_multipart(key, &upload_id, parts).await?;
        debug!("Multipart upload completed: key={}, parts={}", key, part_count);
        Ok::<_, BoxError>(etag)
    }
    .await;

    if result.is_err() {
        if let Err(abort_err) = sink.abort_multipart(key, &upload_id).await {
            warn!(
                "Failed to abort multipart upload '{}' ({}): {}",
                key, upload_id, abort_err
            );
        }
    }

    result
}

/// Upload `first` and every following chunk of `body` as numbered parts
async fn upload_parts<S>(
    sink: &S,
    key: &str,
    upload_id: &str,
    first: Vec<u8>,
    body: &mut ObjectBody,
    content_type: &str,
    part_size: usize,
) -> Result<Vec<Part>, BoxError>
where
    S: PartSink + ?Sized,
{
    let mut parts = Vec::new();
    let mut part_number: u32 = 1;
    let mut chunk = first;

    loop {
        let len = chunk.len();
        debug!("Uploading part: key={}, part={}, size={}", key, part_number, len);

        let part = sink
            .put_part(key, upload_id, part_number, chunk, content_type)
            .await?;
        parts.push(part);

        if len < part_size {
            break;
        }
        chunk = read_part(&mut *body, part_size).await?;
        if chunk.is_empty() {
            break;
        }
        part_number += 1;
    }

    Ok(parts)
}

/// Read up to `part_size` bytes; a shorter result means the body is exhausted
async fn read_part<R>(body: &mut R, part_size: usize) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::new();
    let mut limited = (&mut *body).take(part_size as u64);
    limited.read_to_end(&mut buf).await?;
    Ok(buf)
}

fn ensure_success(operation: &str, target: &str, status: u16) -> Result<(), BoxError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(format!("{} '{}' returned status {}", operation, target, status).into())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn header_etag(headers: &HashMap<String, String>) -> Option<String> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("etag"))
        .map(|(_, value)| value.trim_matches('"').to_string())
}

/// ETag from a CompleteMultipartUploadResult body
fn extract_xml_etag(body: &str) -> Option<String> {
    let start = body.find("<ETag>")? + "<ETag>".len();
    let end = start + body[start..].find("</ETag>")?;
    let etag = body[start..end]
        .replace("&quot;", "")
        .trim_matches('"')
        .to_string();
    (!etag.is_empty()).then_some(etag)
}
