use std::sync::Arc;

use tracing::{debug, info};

use super::client::StorageClient;
use crate::core::error::{Result, StorageOperationError};

/// Check-then-create helper for callers holding only a raw client
pub struct BucketManager<C> {
    client: Arc<C>,
}

impl<C: StorageClient> BucketManager<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    /// Create `bucket` if it does not exist yet.
    ///
    /// The existence check and the create call are separate requests. Two
    /// callers racing on the same name may both issue the create; the
    /// service either accepts or rejects the second one.
    pub async fn create_if_absent(&self, bucket: &str) -> Result<()> {
        let context = || format!("create bucket failed: {}", bucket);

        let exists = self
            .client
            .bucket_exists(bucket)
            .await
            .map_err(|e| StorageOperationError::new(context(), e))?;

        if exists {
            debug!("Bucket '{}' already exists", bucket);
            return Ok(());
        }

        self.client
            .make_bucket(bucket)
            .await
            .map_err(|e| StorageOperationError::new(context(), e))?;

        info!("Bucket '{}' created", bucket);
        Ok(())
    }
}
