//! The remote interface consumed by the synchronizer

use async_trait::async_trait;

use super::errors::RemoteError;
use super::types::RemoteMetadata;

/// Source of metadata and content for remote files
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetch change-detection metadata for `url`
    async fn resolve_metadata(&self, url: &str) -> Result<RemoteMetadata, RemoteError>;

    /// Fetch the full body of `url`
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, RemoteError>;
}
