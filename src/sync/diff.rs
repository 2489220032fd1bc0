//! Cache diff
//!
//! Classifies fingerprints observed in a pass against the stored cache.

use std::collections::HashSet;

use crate::cache::{Cache, Fingerprint};

/// What to do with a cached entry whose URL could not be resolved this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingMetadataPolicy {
    /// Keep the entry until a later pass can resolve it
    #[default]
    Preserve,
    /// Treat the entry as stale
    Prune,
}

/// Outcome of resolving every locator of a pass
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// `(url, fingerprint)` in locator order
    pub resolved: Vec<(String, Fingerprint)>,
    /// URLs whose metadata was unavailable
    pub unresolved: Vec<String>,
}

/// Classification of fingerprints for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDiff {
    /// Observed now, absent from the cache: `(fingerprint, url)` in locator order
    pub new: Vec<(Fingerprint, String)>,
    /// Observed now and already cached
    pub unchanged: Vec<Fingerprint>,
    /// Cached but not observed now, in cache order
    pub stale: Vec<Fingerprint>,
    /// Would be stale, but kept because their URL failed to resolve
    pub preserved: Vec<Fingerprint>,
}

/// Diff the resolved fingerprints of a pass against `cache`
///
/// When two URLs resolve to the same fingerprint, the first one wins.
pub fn compute_diff(
    cache: &Cache,
    resolution: &Resolution,
    policy: MissingMetadataPolicy,
) -> CacheDiff {
    let mut diff = CacheDiff::default();
    let mut seen: HashSet<&Fingerprint> = HashSet::new();

    for (url, fingerprint) in &resolution.resolved {
        if !seen.insert(fingerprint) {
            continue;
        }
        if cache.contains(fingerprint) {
            diff.unchanged.push(fingerprint.clone());
        } else {
            diff.new.push((fingerprint.clone(), url.clone()));
        }
    }

    let unresolved: HashSet<&str> = resolution.unresolved.iter().map(String::as_str).collect();

    for (fingerprint, descriptor) in cache.entries() {
        if seen.contains(fingerprint) {
            continue;
        }
        if policy == MissingMetadataPolicy::Preserve && unresolved.contains(descriptor.url.as_str()) {
            diff.preserved.push(fingerprint.clone());
        } else {
            diff.stale.push(fingerprint.clone());
        }
    }

    diff
}
