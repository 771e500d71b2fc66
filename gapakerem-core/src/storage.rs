use async_trait::async_trait;

use crate::repository::StoreError;

/// Durable blob storage for uploaded images
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `folder` and return a public URL for them
    async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        folder: &str,
    ) -> Result<String, StoreError>;
}
