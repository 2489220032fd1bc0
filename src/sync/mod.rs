//! Cache synchronization engine
//!
//! Fingerprints remote files, diffs them against the stored cache, downloads
//! what is new and prunes what is gone.

pub mod diff;
pub mod errors;
pub mod executor;
pub mod fingerprint;
pub mod pool;
pub mod synchronizer;

pub use diff::MissingMetadataPolicy;
pub use errors::{ItemError, SyncError};
pub use fingerprint::FingerprintStrategy;
pub use synchronizer::{SyncOptions, SyncReport, Synchronizer};
