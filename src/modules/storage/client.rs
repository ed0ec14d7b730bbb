//! Low-level storage client contract
//!
//! The storage template only talks to object storage through this trait.
//! [`MinIOClient`](super::MinIOClient) is the production implementation.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Serialize;
use tokio::io::AsyncRead;

#[cfg(test)]
use mockall::automock;

use crate::core::error::BoxError;

/// Readable object content returned by a download. Owned by the caller and
/// released on drop.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Upload body of unknown length
pub type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

/// Lazy, possibly paginated listing of a bucket's objects
pub type ObjectListing = BoxStream<'static, Result<ObjectItem, BoxError>>;

/// A bucket as reported by the storage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketInfo {
    pub name: String,
    /// Service-assigned creation time
    pub creation_date: Option<DateTime<Utc>>,
}

/// One entry of an object listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectItem {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Acknowledgement of a completed object write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectWriteResponse {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
}

/// Trait defining the object storage calls the template consumes
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Check if a bucket exists
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, BoxError>;

    /// Create a bucket
    async fn make_bucket(&self, bucket: &str) -> Result<(), BoxError>;

    /// Delete a bucket. The service rejects non-empty buckets.
    async fn remove_bucket(&self, bucket: &str) -> Result<(), BoxError>;

    /// List every bucket visible to the credentials, in service order
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BoxError>;

    /// Lazily enumerate the objects of a bucket
    async fn list_objects(&self, bucket: &str) -> Result<ObjectListing, BoxError>;

    /// Stream a body of unknown length into `bucket/key`, `part_size` bytes at a time
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: Option<String>,
        part_size: usize,
    ) -> Result<ObjectWriteResponse, BoxError>;

    /// Open the content of `bucket/key` for reading
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, BoxError>;

    /// Delete a single object
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), BoxError>;

    /// Presigned GET URL; `None` uses the client's default expiry
    async fn presigned_get_object_url(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: Option<u32>,
    ) -> Result<String, BoxError>;
}
