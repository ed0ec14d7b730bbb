//! Storage template
//!
//! A uniform operation set over object storage. Every failure coming out of
//! the storage client is translated into a [`StorageOperationError`] carrying
//! the operation context and the original cause.
//!
//! The template is stateless apart from the shared client and the default
//! bucket name, so one instance can be shared freely between tasks. It adds
//! no locking, retries, timeouts or caching of its own.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use super::client::{BucketInfo, ObjectBody, ObjectReader, ObjectWriteResponse, StorageClient};
use crate::core::error::{BoxError, Result, StorageOperationError};
use crate::shared::constants::UPLOAD_PART_SIZE;

/// Lazy listing of object keys
pub type ObjectKeyStream = BoxStream<'static, Result<String>>;

/// Bucket and object lifecycle operations behind one error contract
#[async_trait]
pub trait StorageTemplate: Send + Sync {
    type Client: StorageClient + 'static;

    /// `true` if `bucket` exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Create `bucket` unless it already exists.
    ///
    /// Not atomic: a concurrent creator may win between the check and the
    /// create call, in which case the service decides whether the second
    /// create fails.
    async fn create_bucket_if_absent(&self, bucket: &str) -> Result<()>;

    /// Stream `stream` into `bucket/key` in fixed-size parts. The total
    /// length does not need to be known.
    async fn upload<R>(
        &self,
        bucket: &str,
        key: &str,
        stream: R,
        content_type: Option<&str>,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static;

    /// [`upload`](Self::upload) into the default bucket
    async fn upload_to_default<R>(
        &self,
        key: &str,
        stream: R,
        content_type: Option<&str>,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static;

    /// Open `bucket/key` for reading. The caller owns the reader; read
    /// failures after this call returns are reported by the reader itself.
    async fn download(&self, bucket: &str, key: &str) -> Result<ObjectReader>;

    /// [`download`](Self::download) from the default bucket
    async fn download_from_default(&self, key: &str) -> Result<ObjectReader>;

    /// Every bucket visible to the credentials, in service order
    async fn get_all_buckets(&self) -> Result<Vec<BucketInfo>>;

    /// Look a bucket up by exact name. Absence is `Ok(None)`.
    async fn get_bucket(&self, name: &str) -> Result<Option<BucketInfo>>;

    async fn remove_bucket(&self, bucket: &str) -> Result<()>;

    /// Delete one object. Removing a missing object is whatever the service
    /// reports it to be.
    async fn remove(&self, bucket: &str, key: &str) -> Result<()>;

    async fn remove_from_default(&self, key: &str) -> Result<()>;

    /// All object keys of `bucket`. The whole listing is read before
    /// returning; any failure part way through fails the call and no partial
    /// list is returned.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>>;

    /// Lazy variant of [`list_objects`](Self::list_objects) for large
    /// buckets. Keys are yielded as pages arrive; a failure is yielded once
    /// as an `Err` item and ends the stream, keys already yielded stay valid.
    async fn list_objects_stream(&self, bucket: &str) -> Result<ObjectKeyStream>;

    /// Presigned GET URL with the client's default expiry
    async fn get_object_url(&self, bucket: &str, key: &str) -> Result<String>;

    /// Presigned GET URL valid for `expiry_secs`. Bounds are enforced by the
    /// client and the service.
    async fn get_object_url_with_expiry(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: u32,
    ) -> Result<String>;

    /// Create a zero-length placeholder object, conventionally with a key
    /// ending in `/`, to stand in for a directory
    async fn create_dir(&self, bucket: &str, key: &str) -> Result<ObjectWriteResponse>;

    /// Run `operation` against the raw client for calls the template does
    /// not wrap (tagging, lifecycle rules, range reads, ...). The result is
    /// returned unchanged; any error is wrapped as `execute failed`.
    async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<Self::Client>) -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
        E: Into<BoxError>,
        T: Send;
}

/// Default [`StorageTemplate`] over any [`StorageClient`]
pub struct DefaultStorageTemplate<C> {
    client: Arc<C>,
    default_bucket: String,
}

impl<C> Clone for DefaultStorageTemplate<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            default_bucket: self.default_bucket.clone(),
        }
    }
}

impl<C: StorageClient> DefaultStorageTemplate<C> {
    pub fn new(client: Arc<C>, default_bucket: impl Into<String>) -> Self {
        Self {
            client,
            default_bucket: default_bucket.into(),
        }
    }

    /// The raw client shared by this template
    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Bucket used by the `*_default` operations
    pub fn default_bucket(&self) -> &str {
        &self.default_bucket
    }
}

fn wrap(context: String) -> impl FnOnce(BoxError) -> StorageOperationError {
    move |source| {
        warn!("{}: {}", context, source);
        StorageOperationError::new(context, source)
    }
}

#[async_trait]
impl<C: StorageClient + 'static> StorageTemplate for DefaultStorageTemplate<C> {
    type Client = C;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        self.client
            .bucket_exists(bucket)
            .await
            .map_err(wrap(format!("check bucket failed: {}", bucket)))
    }

    async fn create_bucket_if_absent(&self, bucket: &str) -> Result<()> {
        let context = || format!("create bucket failed: {}", bucket);

        let exists = self
            .client
            .bucket_exists(bucket)
            .await
            .map_err(wrap(context()))?;

        if exists {
            debug!("Bucket '{}' already exists", bucket);
            return Ok(());
        }

        self.client
            .make_bucket(bucket)
            .await
            .map_err(wrap(context()))?;

        debug!("Bucket '{}' created", bucket);
        Ok(())
    }

    async fn upload<R>(
        &self,
        bucket: &str,
        key: &str,
        stream: R,
        content_type: Option<&str>,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let body: ObjectBody = Box::new(stream);

        let response = self
            .client
            .put_object(
                bucket,
                key,
                body,
                content_type.map(str::to_string),
                UPLOAD_PART_SIZE,
            )
            .await
            .map_err(wrap(format!("upload failed: {}", key)))?;

        debug!(
            "Uploaded '{}' to bucket '{}' (etag: {:?})",
            key, bucket, response.etag
        );
        Ok(())
    }

    async fn upload_to_default<R>(
        &self,
        key: &str,
        stream: R,
        content_type: Option<&str>,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.upload(&self.default_bucket, key, stream, content_type)
            .await
    }

    async fn download(&self, bucket: &str, key: &str) -> Result<ObjectReader> {
        self.client
            .get_object(bucket, key)
            .await
            .map_err(wrap(format!("download failed: {}", key)))
    }

    async fn download_from_default(&self, key: &str) -> Result<ObjectReader> {
        self.download(&self.default_bucket, key).await
    }

    async fn get_all_buckets(&self) -> Result<Vec<BucketInfo>> {
        self.client
            .list_buckets()
            .await
            .map_err(wrap("get all buckets failed".to_string()))
    }

    async fn get_bucket(&self, name: &str) -> Result<Option<BucketInfo>> {
        let buckets = self
            .get_all_buckets()
            .await
            .map_err(|e| wrap(format!("get bucket failed: {}", name))(e.into()))?;

        Ok(buckets.into_iter().find(|bucket| bucket.name == name))
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .remove_bucket(bucket)
            .await
            .map_err(wrap(format!("remove bucket failed: {}", bucket)))
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .remove_object(bucket, key)
            .await
            .map_err(wrap(format!("remove failed: {}", key)))
    }

    async fn remove_from_default(&self, key: &str) -> Result<()> {
        self.remove(&self.default_bucket, key).await
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<String>> {
        let context = || format!("list objects failed: {}", bucket);

        let listing = self
            .client
            .list_objects(bucket)
            .await
            .map_err(wrap(context()))?;

        let keys: Vec<String> = listing
            .map_ok(|item| item.key)
            .try_collect()
            .await
            .map_err(wrap(context()))?;

        debug!("Listed {} objects in bucket '{}'", keys.len(), bucket);
        Ok(keys)
    }

    async fn list_objects_stream(&self, bucket: &str) -> Result<ObjectKeyStream> {
        let context = format!("list objects failed: {}", bucket);

        let listing = self
            .client
            .list_objects(bucket)
            .await
            .map_err(wrap(context.clone()))?;

        let keys = listing
            .map_ok(|item| item.key)
            .map_err(move |e| wrap(context.clone())(e))
            .scan(false, |failed, item| {
                let next = if *failed {
                    None
                } else {
                    *failed = item.is_err();
                    Some(item)
                };
                futures::future::ready(next)
            });

        Ok(keys.boxed())
    }

    async fn get_object_url(&self, bucket: &str, key: &str) -> Result<String> {
        self.client
            .presigned_get_object_url(bucket, key, None)
            .await
            .map_err(wrap(format!("get object url failed: {}/{}", bucket, key)))
    }

    async fn get_object_url_with_expiry(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: u32,
    ) -> Result<String> {
        self.client
            .presigned_get_object_url(bucket, key, Some(expiry_secs))
            .await
            .map_err(wrap(format!("get object url failed: {}/{}", bucket, key)))
    }

    async fn create_dir(&self, bucket: &str, key: &str) -> Result<ObjectWriteResponse> {
        let body: ObjectBody = Box::new(tokio::io::empty());

        self.client
            .put_object(bucket, key, body, None, UPLOAD_PART_SIZE)
            .await
            .map_err(wrap(format!("create dir failed: {}/{}", bucket, key)))
    }

    async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<Self::Client>) -> Fut + Send,
        Fut: Future<Output = std::result::Result<T, E>> + Send,
        E: Into<BoxError>,
        T: Send,
    {
        operation(Arc::clone(&self.client))
            .await
            .map_err(|e| wrap("execute failed".to_string())(e.into()))
    }
}
