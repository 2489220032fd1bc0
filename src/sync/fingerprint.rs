//! Fingerprint Provider
//!
//! Turns a URL and its remote metadata into the identity used as cache key.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::cache::Fingerprint;
use crate::remote::RemoteMetadata;

type HmacSha256 = Hmac<Sha256>;

/// How a fingerprint is derived from remote metadata
#[derive(Clone)]
pub enum FingerprintStrategy {
    /// The remote entity tag, used verbatim
    EntityTag,
    /// Hex HMAC-SHA-256 over `url + last_modified`
    Hmac { secret: Vec<u8> },
}

impl FingerprintStrategy {
    pub fn hmac(secret: impl Into<Vec<u8>>) -> Self {
        FingerprintStrategy::Hmac {
            secret: secret.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FingerprintStrategy::EntityTag => "etag",
            FingerprintStrategy::Hmac { .. } => "hmac",
        }
    }

    /// Compute the fingerprint for `url`
    ///
    /// Returns `None` when the metadata this strategy needs is missing.
    pub fn fingerprint(&self, url: &str, metadata: &RemoteMetadata) -> Option<Fingerprint> {
        match self {
            FingerprintStrategy::EntityTag => metadata
                .etag
                .as_deref()
                .filter(|etag| !etag.is_empty())
                .map(Fingerprint::from),
            FingerprintStrategy::Hmac { secret } => {
                let last_modified = metadata
                    .last_modified
                    .as_deref()
                    .filter(|lm| !lm.is_empty())?;
                keyed_hash(secret, url, last_modified)
            }
        }
    }
}

impl std::fmt::Debug for FingerprintStrategy {
    // Keeps the secret out of logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn keyed_hash(secret: &[u8], url: &str, last_modified: &str) -> Option<Fingerprint> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(url.as_bytes());
    mac.update(last_modified.as_bytes());
    Some(Fingerprint::new(hex::encode(mac.finalize().into_bytes())))
}
