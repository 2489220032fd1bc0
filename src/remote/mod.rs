//! Remote site access
//!
//! HTTP client for the password-protected site plus the trait the
//! synchronizer uses to reach it.

pub mod client;
pub mod errors;
pub mod source;
pub mod types;

pub use client::SiteClient;
pub use errors::RemoteError;
pub use source::RemoteSource;
pub use types::RemoteMetadata;
