//! sitemirror - keeps a local copy of the files linked from a protected page
//!
//! Each run logs in, collects the file links from the listing page and
//! reconciles them against the local cache in one pass.

mod cache;
mod config;
mod remote;
mod scrape;
mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cache::CacheStore;
use config::Config;
use remote::SiteClient;
use scrape::LinkExtractor;
use sync::Synchronizer;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load()?;
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e);
    }

    let data_dir = config.data_dir()?;
    info!(data_dir = %data_dir.display(), "Saving files");

    let store = CacheStore::new(&data_dir);
    store
        .bootstrap()
        .with_context(|| format!("Failed to prepare {}", data_dir.display()))?;

    let client = SiteClient::new(config.base_url(), config.request_timeout())?;
    match config.password.as_deref() {
        Some(password) if !password.is_empty() => {
            client
                .login(password, &config.post_id, &config.login_path)
                .await?;
        }
        _ => warn!("PASSWORD not set, continuing without login"),
    }

    let html = client.fetch_page(&config.page_path).await?;
    let extractor = LinkExtractor::new(&config.link_selector)?;
    let locators = extractor.extract(&html, &config.page_url());

    let synchronizer = Synchronizer::new(
        Arc::new(client),
        store,
        config.strategy()?,
        config.sync_options(),
    );

    let report = match synchronizer.run_pass(&locators).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Cache update failed");
            return Err(e.into());
        }
    };

    for failure in &report.failures {
        warn!(error = %failure, "Skipped");
    }
    info!(
        links = report.locators,
        downloaded = report.downloaded.len(),
        unchanged = report.unchanged,
        pruned = report.pruned,
        skipped = report.skipped(),
        "Sync complete"
    );

    Ok(())
}
