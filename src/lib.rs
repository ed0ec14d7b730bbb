//! MinIO/S3 storage template
//!
//! A single uniform interface over S3-compatible object storage: bucket
//! existence and creation, streamed upload and download, listing, removal,
//! presigned URLs, and an escape hatch for running arbitrary operations
//! against the raw client. Every failure is reported as a
//! [`StorageOperationError`].

pub mod core;
pub mod modules;
pub mod shared;

pub use crate::core::config::{Config, MinIOConfig};
pub use crate::core::error::{BoxError, ConfigError, StorageOperationError};
pub use crate::modules::storage::{
    init_storage, BucketInfo, BucketManager, DefaultStorageTemplate, MinIOClient, ObjectItem,
    ObjectReader, ObjectWriteResponse, StorageClient, StorageTemplate,
};
