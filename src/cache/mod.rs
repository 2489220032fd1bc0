//! Persistent mirror cache
//!
//! The fingerprint → resource index and the content directory it describes.

pub mod errors;
pub mod store;
pub mod types;

pub use errors::StorageError;
pub use store::CacheStore;
pub use types::{local_name, Cache, Fingerprint, ResourceDescriptor};
