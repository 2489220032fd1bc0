//! Runtime configuration
//!
//! Every option can be given as a flag or through the environment. A `.env`
//! file in the data directory is read before parsing, so a scheduled job only
//! needs that file next to `cache.json`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;

use crate::sync::{FingerprintStrategy, MissingMetadataPolicy, SyncOptions};

/// Environment file read from the data directory
pub const ENV_FILE_NAME: &str = ".env";

/// How fingerprints are derived from remote headers
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    /// Use the `ETag` header as is
    Etag,
    /// HMAC-SHA-256 over the URL and `Last-Modified`
    Hmac,
}

/// Policy for cached entries whose metadata could not be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MissingMetadata {
    Preserve,
    Prune,
}

impl From<MissingMetadata> for MissingMetadataPolicy {
    fn from(value: MissingMetadata) -> Self {
        match value {
            MissingMetadata::Preserve => MissingMetadataPolicy::Preserve,
            MissingMetadata::Prune => MissingMetadataPolicy::Prune,
        }
    }
}

/// Mirror the files linked from a password-protected page
#[derive(Debug, Clone, Parser)]
#[command(name = "sitemirror", version, about)]
pub struct Config {
    /// Directory holding cache.json, files/ and .env (defaults to the current directory)
    #[arg(value_name = "DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Root URL of the site
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// Password for the protected post; login is skipped when unset
    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Path of the page listing the files
    #[arg(long, env = "PAGE_PATH", default_value = "/choere/gmc/?ppwp=1")]
    pub page_path: String,

    /// Path of the password form endpoint
    #[arg(long, env = "LOGIN_PATH", default_value = "/wp-login.php?action=ppw_postpass")]
    pub login_path: String,

    /// ID of the protected post sent with the password
    #[arg(long, env = "POST_ID", default_value = "35")]
    pub post_id: String,

    /// CSS selector for the file links on the page
    #[arg(
        long,
        env = "HTML_AHREF_ELEMENT_SELECTOR",
        default_value = r#"a[rel="noopener noreferrer"]"#
    )]
    pub link_selector: String,

    /// Fingerprint derivation
    #[arg(long, env = "FINGERPRINT_STRATEGY", value_enum, default_value_t = StrategyKind::Hmac)]
    pub fingerprint_strategy: StrategyKind,

    /// Key for HMAC fingerprints
    #[arg(long, env = "FINGERPRINT_SECRET", hide_env_values = true)]
    pub fingerprint_secret: Option<String>,

    /// Maximum concurrent requests
    #[arg(long, env = "MAX_CONCURRENT", default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub max_concurrent: u16,

    /// Per-request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// What to do with cached files whose metadata cannot be fetched
    #[arg(long, env = "MISSING_METADATA", value_enum, default_value_t = MissingMetadata::Preserve)]
    pub missing_metadata: MissingMetadata,
}

impl Config {
    /// Parse the process arguments, reading `<data_dir>/.env` first
    ///
    /// Usage errors and `--help` exit the process the way `Config::parse` does.
    pub fn load() -> Result<Self> {
        match Self::load_from(std::env::args_os()) {
            Ok(config) => Ok(config),
            Err(e) => match e.downcast::<clap::Error>() {
                Ok(usage) => usage.exit(),
                Err(e) => Err(e),
            },
        }
    }

    /// Parse `args`, reading `<data_dir>/.env` first when it exists
    ///
    /// Variables already set in the environment win over the file, and flags
    /// win over both.
    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let config = Self::try_parse_from(args.clone())?;

        let env_file = config.data_dir()?.join(ENV_FILE_NAME);
        if !env_file.is_file() {
            return Ok(config);
        }
        dotenvy::from_path(&env_file)
            .with_context(|| format!("Failed to read {}", env_file.display()))?;
        info!(path = %env_file.display(), "Loaded environment file");

        Ok(Self::try_parse_from(args)?)
    }

    /// Check values clap cannot validate on its own
    pub fn validate(&self) -> Result<()> {
        if self.base_url().trim().is_empty() {
            return Err(anyhow!("BASE_URL not set"));
        }
        reqwest::Url::parse(self.base_url())
            .map_err(|e| anyhow!("BASE_URL '{}' is not a valid URL: {}", self.base_url(), e))?;
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("REQUEST_TIMEOUT_SECS must be at least 1"));
        }
        self.strategy().map(|_| ())
    }

    /// Resolved data directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Site root; empty until validated
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Fingerprint strategy with its secret
    pub fn strategy(&self) -> Result<FingerprintStrategy> {
        match self.fingerprint_strategy {
            StrategyKind::Etag => Ok(FingerprintStrategy::EntityTag),
            StrategyKind::Hmac => match self.fingerprint_secret.as_deref() {
                Some(secret) if !secret.is_empty() => Ok(FingerprintStrategy::hmac(secret)),
                _ => Err(anyhow!(
                    "FINGERPRINT_SECRET is required for the hmac fingerprint strategy"
                )),
            },
        }
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            max_concurrent: usize::from(self.max_concurrent),
            request_timeout: self.request_timeout(),
            missing_metadata: self.missing_metadata.into(),
        }
    }

    /// URL of the listing page, used to resolve relative links
    pub fn page_url(&self) -> String {
        format!("{}{}", self.base_url().trim_end_matches('/'), self.page_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, clap::Error> {
        let mut argv = vec!["sitemirror"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[
            "--base-url",
            "https://abc.de",
            "--fingerprint-secret",
            "s3cret",
        ])
        .unwrap();

        assert_eq!(config.page_path, "/choere/gmc/?ppwp=1");
        assert_eq!(config.link_selector, r#"a[rel="noopener noreferrer"]"#);
        assert_eq!(config.post_id, "35");
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.fingerprint_strategy, StrategyKind::Hmac);
        assert_eq!(config.missing_metadata, MissingMetadata::Preserve);
        assert_eq!(config.page_url(), "https://abc.de/choere/gmc/?ppwp=1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_data_dir_positional() {
        let config = parse(&["/srv/mirror", "--base-url", "https://abc.de"]).unwrap();
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/srv/mirror"));
    }

    #[test]
    fn test_hmac_requires_secret() {
        let config = parse(&["--base-url", "https://abc.de"]).unwrap();
        assert!(config.validate().is_err());

        let etag = parse(&["--base-url", "https://abc.de", "--fingerprint-strategy", "etag"]).unwrap();
        assert!(etag.validate().is_ok());
        assert!(matches!(etag.strategy().unwrap(), FingerprintStrategy::EntityTag));
    }

    #[test]
    fn test_invalid_base_url() {
        let config = parse(&[
            "--base-url",
            "not a url",
            "--fingerprint-strategy",
            "etag",
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(parse(&["--base-url", "https://abc.de", "--max-concurrent", "0"]).is_err());
    }

    #[test]
    fn test_sync_options() {
        let config = parse(&[
            "--base-url",
            "https://abc.de",
            "--max-concurrent",
            "8",
            "--request-timeout-secs",
            "5",
            "--missing-metadata",
            "prune",
        ])
        .unwrap();

        let options = config.sync_options();
        assert_eq!(options.max_concurrent, 8);
        assert_eq!(options.request_timeout, Duration::from_secs(5));
        assert_eq!(options.missing_metadata, MissingMetadataPolicy::Prune);
    }

    #[test]
    fn test_env_file_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(ENV_FILE_NAME),
            "BASE_URL=https://from-env-file.example\nPASSWORD=letmein\nLOGIN_PATH=/from-file\n",
        )
        .unwrap();

        let data_dir = dir.path().to_string_lossy().into_owned();
        let config = Config::load_from([
            "sitemirror",
            data_dir.as_str(),
            "--login-path",
            "/from-flag",
            "--fingerprint-strategy",
            "etag",
        ])
        .unwrap();

        assert_eq!(config.base_url(), "https://from-env-file.example");
        assert_eq!(config.password.as_deref(), Some("letmein"));
        // Flags win over the file
        assert_eq!(config.login_path, "/from-flag");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_env_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_string_lossy().into_owned();

        let config = Config::load_from([
            "sitemirror",
            data_dir.as_str(),
            "--base-url",
            "https://abc.de",
        ])
        .unwrap();

        assert_eq!(config.data_dir().unwrap(), dir.path());
        assert_eq!(config.base_url(), "https://abc.de");
    }
}
