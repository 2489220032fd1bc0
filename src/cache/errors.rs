//! Cache storage error types

use std::path::PathBuf;

/// Failures of the persisted cache or content directory
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to read cache snapshot {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cache snapshot {path:?} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
