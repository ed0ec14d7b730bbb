//! In-memory storage client used by unit tests

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio::io::AsyncReadExt;

use crate::core::error::BoxError;
use crate::modules::storage::{
    BucketInfo, ObjectBody, ObjectItem, ObjectListing, ObjectReader, ObjectWriteResponse,
    StorageClient,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryStorageError {
    #[error("The specified bucket does not exist: {0}")]
    NoSuchBucket(String),

    #[error("The specified key does not exist: {0}")]
    NoSuchKey(String),

    #[error("Your previous request to create the named bucket succeeded and you already own it: {0}")]
    BucketAlreadyOwnedByYou(String),

    #[error("The bucket you tried to delete is not empty: {0}")]
    BucketNotEmpty(String),
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    /// Number of parts the body was read in
    pub parts: usize,
}

#[derive(Default)]
struct State {
    /// Buckets in creation order, objects sorted by key
    buckets: Vec<(BucketInfo, BTreeMap<String, StoredObject>)>,
}

impl State {
    fn bucket(&self, name: &str) -> Result<&BTreeMap<String, StoredObject>, MemoryStorageError> {
        self.buckets
            .iter()
            .find(|(info, _)| info.name == name)
            .map(|(_, objects)| objects)
            .ok_or_else(|| MemoryStorageError::NoSuchBucket(name.to_string()))
    }

    fn bucket_mut(
        &mut self,
        name: &str,
    ) -> Result<&mut BTreeMap<String, StoredObject>, MemoryStorageError> {
        self.buckets
            .iter_mut()
            .find(|(info, _)| info.name == name)
            .map(|(_, objects)| objects)
            .ok_or_else(|| MemoryStorageError::NoSuchBucket(name.to_string()))
    }
}

/// `StorageClient` keeping everything in memory.
///
/// Listings are served in pages of `page_size` keys so pagination paths are
/// exercised, and every presigned URL carries a fresh nonce.
pub struct InMemoryStorageClient {
    state: Mutex<State>,
    page_size: usize,
    nonce: AtomicU64,
    make_bucket_calls: AtomicU64,
}

impl Default for InMemoryStorageClient {
    fn default() -> Self {
        Self::with_page_size(1000)
    }
}

impl InMemoryStorageClient {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
            nonce: AtomicU64::new(0),
            make_bucket_calls: AtomicU64::new(0),
        }
    }

    /// Look at a stored object directly
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let state = self.state.lock().unwrap();
        state.bucket(bucket).ok()?.get(key).cloned()
    }

    pub fn bucket_count(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .buckets
            .iter()
            .filter(|(info, _)| info.name == name)
            .count()
    }

    pub fn make_bucket_calls(&self) -> u64 {
        self.make_bucket_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageClient for InMemoryStorageClient {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state.bucket(bucket).is_ok())
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), BoxError> {
        self.make_bucket_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.bucket(bucket).is_ok() {
            return Err(MemoryStorageError::BucketAlreadyOwnedByYou(bucket.to_string()).into());
        }
        state.buckets.push((
            BucketInfo {
                name: bucket.to_string(),
                creation_date: Some(Utc::now()),
            },
            BTreeMap::new(),
        ));
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        if !state.bucket(bucket)?.is_empty() {
            return Err(MemoryStorageError::BucketNotEmpty(bucket.to_string()).into());
        }
        state.buckets.retain(|(info, _)| info.name != bucket);
        Ok(())
    }

    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, BoxError> {
        let state = self.state.lock().unwrap();
        Ok(state.buckets.iter().map(|(info, _)| info.clone()).collect())
    }

    async fn list_objects(&self, bucket: &str) -> Result<ObjectListing, BoxError> {
        let items: Vec<ObjectItem> = {
            let state = self.state.lock().unwrap();
            state
                .bucket(bucket)?
                .iter()
                .map(|(key, object)| ObjectItem {
                    key: key.clone(),
                    size: object.data.len() as u64,
                    last_modified: None,
                })
                .collect()
        };

        // One page per chunk, mirroring a continuation-token listing
        let pages: Vec<Vec<ObjectItem>> = items
            .chunks(self.page_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        Ok(stream::iter(pages)
            .flat_map(|page| stream::iter(page.into_iter().map(Ok::<_, BoxError>)))
            .boxed())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ObjectBody,
        content_type: Option<String>,
        part_size: usize,
    ) -> Result<ObjectWriteResponse, BoxError> {
        {
            let state = self.state.lock().unwrap();
            state.bucket(bucket)?;
        }

        let mut data = Vec::new();
        let mut parts = 0;
        loop {
            let mut part = Vec::new();
            (&mut body)
                .take(part_size as u64)
                .read_to_end(&mut part)
                .await?;
            if part.is_empty() && parts > 0 {
                break;
            }
            parts += 1;
            let done = part.len() < part_size;
            data.extend_from_slice(&part);
            if done {
                break;
            }
        }

        let etag = format!("{:x}-{}", data.len(), parts);
        let mut state = self.state.lock().unwrap();
        state.bucket_mut(bucket)?.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type,
                parts,
            },
        );

        Ok(ObjectWriteResponse {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: Some(etag),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, BoxError> {
        let state = self.state.lock().unwrap();
        let object = state
            .bucket(bucket)?
            .get(key)
            .ok_or_else(|| MemoryStorageError::NoSuchKey(key.to_string()))?;
        Ok(Box::pin(std::io::Cursor::new(object.data.clone())))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<(), BoxError> {
        let mut state = self.state.lock().unwrap();
        state.bucket_mut(bucket)?.remove(key);
        Ok(())
    }

    async fn presigned_get_object_url(
        &self,
        bucket: &str,
        key: &str,
        expiry_secs: Option<u32>,
    ) -> Result<String, BoxError> {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "http://127.0.0.1:9000/{}/{}?X-Amz-Expires={}&X-Amz-Signature={:016x}",
            bucket,
            key,
            expiry_secs.unwrap_or(604_800),
            nonce
        ))
    }
}
