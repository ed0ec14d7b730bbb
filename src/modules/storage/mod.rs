//! Storage module for object management
//!
//! Provides the storage template over MinIO/S3-compatible storage: bucket
//! lifecycle, streamed upload and download, listing and presigned URLs.

mod bucket_manager;
mod client;
mod minio_client;
mod template;

use std::sync::Arc;

use tracing::info;

pub use bucket_manager::BucketManager;
#[cfg(test)]
pub use client::MockStorageClient;
pub use client::{
    BucketInfo, ObjectBody, ObjectItem, ObjectListing, ObjectReader, ObjectWriteResponse,
    StorageClient,
};
pub use minio_client::MinIOClient;
pub use template::{DefaultStorageTemplate, ObjectKeyStream, StorageTemplate};

use crate::core::config::MinIOConfig;
use crate::core::error::Result;

/// Build the storage template from configuration
///
/// Returns `None` when storage is disabled. When `auto_create_bucket` is set
/// the default bucket is created up front if it is missing.
pub async fn init_storage(
    config: &MinIOConfig,
) -> Result<Option<DefaultStorageTemplate<MinIOClient>>> {
    if !config.enabled {
        info!("MinIO storage disabled (MINIO_ENABLED=false)");
        return Ok(None);
    }

    let client = Arc::new(MinIOClient::new(config)?);

    if config.auto_create_bucket {
        BucketManager::new(Arc::clone(&client))
            .create_if_absent(&config.bucket)
            .await?;
    }

    info!(
        "Storage template ready: endpoint={}, default_bucket={}",
        config.endpoint, config.bucket
    );

    Ok(Some(DefaultStorageTemplate::new(client, config.bucket.clone())))
}
