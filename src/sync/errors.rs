//! Synchronization error types

use crate::cache::StorageError;

/// Failure that aborts a reconciliation pass
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Failure of a single locator; recorded, never fatal for the pass
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ItemError {
    #[error("Metadata unavailable for {url}: {reason}")]
    MetadataUnavailable { url: String, reason: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailure { url: String, reason: String },
}
