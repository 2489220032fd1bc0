//! Synchronizer
//!
//! Drives one reconciliation pass:
//! load → resolve → diff → download → prune → persist.
//!
//! The cache is owned by the pass and only written back once, at the end.
//! A pass that fails before persisting leaves the previous snapshot intact.
//! Store I/O runs on the blocking pool.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::diff::{compute_diff, MissingMetadataPolicy, Resolution};
use super::errors::{ItemError, SyncError};
use super::executor::{DownloadExecutor, DownloadJob, DownloadOutcome};
use super::fingerprint::FingerprintStrategy;
use super::pool::run_bounded;
use crate::cache::{Cache, CacheStore, Fingerprint, ResourceDescriptor, StorageError};
use crate::remote::RemoteSource;

/// Stages of a reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Loading,
    Resolving,
    Diffing,
    Downloading,
    Pruning,
    Persisting,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncPhase::Loading => "loading",
            SyncPhase::Resolving => "resolving",
            SyncPhase::Diffing => "diffing",
            SyncPhase::Downloading => "downloading",
            SyncPhase::Pruning => "pruning",
            SyncPhase::Persisting => "persisting",
            SyncPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// Tunables for a pass
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Maximum requests in flight during resolution and download
    pub max_concurrent: usize,
    /// Timeout applied to each metadata and content request
    pub request_timeout: Duration,
    /// Fate of cached entries whose URL could not be resolved
    pub missing_metadata: MissingMetadataPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            request_timeout: Duration::from_secs(30),
            missing_metadata: MissingMetadataPolicy::Preserve,
        }
    }
}

/// Summary of a completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Locators supplied to the pass
    pub locators: usize,
    /// Locators whose fingerprint was resolved
    pub resolved: usize,
    /// Entries already mirrored and left untouched
    pub unchanged: usize,
    /// URLs downloaded and added to the cache
    pub downloaded: Vec<String>,
    /// Per-item failures (metadata or download)
    pub failures: Vec<ItemError>,
    /// Entries removed from the cache
    pub pruned: usize,
    /// Entries kept although their URL could not be resolved
    pub preserved: usize,
    /// Content files deleted after pruning
    pub removed_files: usize,
    /// Entries in the persisted snapshot
    pub entries: usize,
}

impl SyncReport {
    pub fn skipped(&self) -> usize {
        self.failures.len()
    }
}

/// Reconciles a [`CacheStore`] against a [`RemoteSource`]
pub struct Synchronizer {
    source: Arc<dyn RemoteSource>,
    store: CacheStore,
    strategy: FingerprintStrategy,
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        store: CacheStore,
        strategy: FingerprintStrategy,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            strategy,
            options,
        }
    }

    /// Run one reconciliation pass over `locators`
    ///
    /// Per-item failures are recorded in the report. Only storage failures
    /// abort the pass. The store must have been bootstrapped.
    pub async fn run_pass(&self, locators: &[String]) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport {
            locators: locators.len(),
            ..SyncReport::default()
        };

        enter(SyncPhase::Loading);
        let mut cache = self.with_store(|store| store.load()).await?;
        info!(entries = cache.len(), "Loaded cache");

        enter(SyncPhase::Resolving);
        let resolution = self.resolve(locators, &mut report).await;
        report.resolved = resolution.resolved.len();
        info!(
            resolved = resolution.resolved.len(),
            unresolved = resolution.unresolved.len(),
            "Resolved fingerprints"
        );

        enter(SyncPhase::Diffing);
        let diff = compute_diff(&cache, &resolution, self.options.missing_metadata);
        report.unchanged = diff.unchanged.len();
        report.preserved = diff.preserved.len();
        info!(
            new = diff.new.len(),
            unchanged = diff.unchanged.len(),
            stale = diff.stale.len(),
            preserved = diff.preserved.len(),
            "Computed cache diff"
        );

        enter(SyncPhase::Downloading);
        let jobs: Vec<DownloadJob> = diff
            .new
            .iter()
            .map(|(fingerprint, url)| DownloadJob {
                fingerprint: fingerprint.clone(),
                url: url.clone(),
            })
            .collect();
        let outcomes = self.executor().run(jobs).await;

        let mut stored = Vec::new();
        let mut failed = Vec::new();
        for outcome in outcomes {
            match outcome {
                DownloadOutcome::Stored { fingerprint, url, .. } => stored.push((fingerprint, url)),
                DownloadOutcome::Failed { fingerprint, error } => {
                    failed.push(fingerprint);
                    report.failures.push(error);
                }
            }
        }
        info!(downloaded = stored.len(), failed = failed.len(), "Downloads finished");

        enter(SyncPhase::Pruning);
        let mut pruned = Vec::new();
        for fingerprint in diff.stale.iter().chain(failed.iter()) {
            if let Some(descriptor) = cache.remove(fingerprint) {
                debug!(fingerprint = %fingerprint, url = %descriptor.url, "Pruned cache entry");
                pruned.push(descriptor);
            }
        }
        report.pruned = pruned.len();

        for (fingerprint, url) in stored {
            cache.insert(fingerprint, ResourceDescriptor::new(url.clone()));
            report.downloaded.push(url);
        }
        if !pruned.is_empty() {
            info!(pruned = pruned.len(), "Deleted items from cache");
        }

        enter(SyncPhase::Persisting);
        let cache = self
            .with_store(move |store| store.save(&cache).map(|()| cache))
            .await?;
        report.entries = cache.len();
        report.removed_files = self.remove_orphaned_content(&cache, &pruned).await;

        enter(SyncPhase::Done);
        info!(
            entries = report.entries,
            downloaded = report.downloaded.len(),
            pruned = report.pruned,
            skipped = report.skipped(),
            "Cache updated"
        );
        Ok(report)
    }

    /// Run blocking store I/O off the async runtime
    async fn with_store<T, F>(&self, op: F) -> Result<T, SyncError>
    where
        F: FnOnce(&CacheStore) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || op(&store)).await??)
    }

    fn executor(&self) -> DownloadExecutor {
        DownloadExecutor::new(
            Arc::clone(&self.source),
            self.store.clone(),
            self.options.max_concurrent,
            self.options.request_timeout,
        )
    }

    /// Resolve every locator to a fingerprint
    async fn resolve(&self, locators: &[String], report: &mut SyncReport) -> Resolution {
        let results = run_bounded(locators.to_vec(), self.options.max_concurrent, move |url| {
            self.resolve_one(url)
        })
        .await;

        let mut resolution = Resolution::default();
        for result in results {
            match result {
                Ok((url, fingerprint)) => resolution.resolved.push((url, fingerprint)),
                Err(error) => {
                    if let ItemError::MetadataUnavailable { url, .. } = &error {
                        resolution.unresolved.push(url.clone());
                    }
                    report.failures.push(error);
                }
            }
        }
        resolution
    }

    async fn resolve_one(&self, url: String) -> Result<(String, Fingerprint), ItemError> {
        let unavailable = |reason: String| {
            warn!(url = %url, reason = %reason, "Metadata unavailable, skipping");
            ItemError::MetadataUnavailable {
                url: url.clone(),
                reason,
            }
        };

        let metadata = match tokio::time::timeout(
            self.options.request_timeout,
            self.source.resolve_metadata(&url),
        )
        .await
        {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(e)) => return Err(unavailable(e.to_string())),
            Err(_) => {
                return Err(unavailable(format!(
                    "timed out after {:?}",
                    self.options.request_timeout
                )))
            }
        };

        match self.strategy.fingerprint(&url, &metadata) {
            Some(fingerprint) => {
                debug!(url = %url, fingerprint = %fingerprint, "Resolved fingerprint");
                Ok((url, fingerprint))
            }
            None => Err(unavailable(format!(
                "no usable header for {} fingerprint",
                self.strategy.name()
            ))),
        }
    }

    /// Delete content files of pruned entries no surviving entry still uses
    ///
    /// Returns the number of files actually deleted.
    async fn remove_orphaned_content(&self, cache: &Cache, pruned: &[ResourceDescriptor]) -> usize {
        let in_use: HashSet<&str> = cache
            .entries()
            .into_iter()
            .map(|(_, descriptor)| descriptor.local_name())
            .collect();

        let mut orphaned: Vec<String> = Vec::new();
        for descriptor in pruned {
            let name = descriptor.local_name();
            if !in_use.contains(name) && !orphaned.iter().any(|n| n == name) {
                orphaned.push(name.to_string());
            }
        }
        if orphaned.is_empty() {
            return 0;
        }

        let removed = self
            .with_store(move |store| {
                let mut removed: usize = 0;
                for name in &orphaned {
                    match store.remove_content(name) {
                        Ok(true) => removed += 1,
                        Ok(false) => debug!(file = %name, "Pruned content already gone"),
                        Err(e) => warn!(file = %name, error = %e, "Failed to remove pruned content"),
                    }
                }
                Ok(removed)
            })
            .await;

        match removed {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Failed to remove pruned content");
                0
            }
        }
    }
}

fn enter(phase: SyncPhase) {
    debug!(phase = %phase, "Sync phase");
}
