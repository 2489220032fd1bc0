//! Download Executor
//!
//! Fetches new resources with a bounded number of requests in flight and
//! writes each body into the content directory. One attempt per URL.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::errors::ItemError;
use super::pool::run_bounded;
use crate::cache::{local_name, CacheStore, Fingerprint};
use crate::remote::RemoteSource;

/// A resource to download for a new fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub fingerprint: Fingerprint,
    pub url: String,
}

/// Result of one download job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Body fetched and written to `path`
    Stored {
        fingerprint: Fingerprint,
        url: String,
        path: PathBuf,
    },
    /// Nothing was written
    Failed {
        fingerprint: Fingerprint,
        error: ItemError,
    },
}

impl DownloadOutcome {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            DownloadOutcome::Stored { fingerprint, .. } => fingerprint,
            DownloadOutcome::Failed { fingerprint, .. } => fingerprint,
        }
    }
}

/// Downloads resources into a [`CacheStore`]
pub struct DownloadExecutor {
    source: Arc<dyn RemoteSource>,
    store: CacheStore,
    max_concurrent: usize,
    request_timeout: Duration,
}

impl DownloadExecutor {
    pub fn new(
        source: Arc<dyn RemoteSource>,
        store: CacheStore,
        max_concurrent: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            max_concurrent,
            request_timeout,
        }
    }

    /// Run every job and report outcomes in job order
    pub async fn run(&self, jobs: Vec<DownloadJob>) -> Vec<DownloadOutcome> {
        run_bounded(jobs, self.max_concurrent, move |job| self.download(job)).await
    }

    /// Fetch one resource and persist it under its local name
    async fn download(&self, job: DownloadJob) -> DownloadOutcome {
        let DownloadJob { fingerprint, url } = job;
        let failed = |reason: String| {
            warn!(url = %url, reason = %reason, "Download failed, skipping");
            DownloadOutcome::Failed {
                fingerprint: fingerprint.clone(),
                error: ItemError::DownloadFailure {
                    url: url.clone(),
                    reason,
                },
            }
        };

        debug!(url = %url, "Downloading");

        let bytes = match tokio::time::timeout(self.request_timeout, self.source.fetch_bytes(&url)).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => return failed(e.to_string()),
            Err(_) => return failed(format!("timed out after {:?}", self.request_timeout)),
        };

        let name = local_name(&url).to_string();
        let store = self.store.clone();
        let size = bytes.len();
        let persisted =
            tokio::task::spawn_blocking(move || store.persist_content(&name, &bytes)).await;

        match persisted {
            Ok(Ok(path)) => {
                debug!(url = %url, size = size, path = %path.display(), "Stored download");
                DownloadOutcome::Stored {
                    fingerprint: fingerprint.clone(),
                    url: url.clone(),
                    path,
                }
            }
            Ok(Err(e)) => failed(e.to_string()),
            Err(e) => failed(format!("write task failed: {}", e)),
        }
    }
}
