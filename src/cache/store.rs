//! Cache Store
//!
//! Owns the on-disk layout of a mirror: the `cache.json` snapshot and the
//! `files/` content directory. Snapshots are replaced atomically through a
//! temp file in the same directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::errors::StorageError;
use super::types::Cache;

/// File name of the persisted snapshot
pub const CACHE_FILE_NAME: &str = "cache.json";

/// Directory holding downloaded content
pub const CONTENT_DIR_NAME: &str = "files";

/// Prefix for temp files so interrupted writes can be cleaned up
const TEMP_PREFIX: &str = ".sitemirror-";

/// Persistent cache snapshot plus content directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    /// Path to `cache.json`
    cache_file: PathBuf,
    /// Directory where downloaded files are written
    content_dir: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at `data_dir`
    ///
    /// Nothing is touched on disk until [`CacheStore::bootstrap`] runs.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            cache_file: data_dir.join(CACHE_FILE_NAME),
            content_dir: data_dir.join(CONTENT_DIR_NAME),
        }
    }

    pub fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Ensure the content directory and snapshot file exist
    ///
    /// Writes an empty snapshot (`[]`) when none exists. Existing snapshots are
    /// left untouched, so calling this repeatedly is harmless. Temp files left
    /// by an interrupted write are removed.
    pub fn bootstrap(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.content_dir).map_err(|source| StorageError::Write {
            path: self.content_dir.clone(),
            source,
        })?;

        if let Some(parent) = self.cache_file.parent() {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
            cleanup_temp_files(parent);
        }
        cleanup_temp_files(&self.content_dir);

        if !self.cache_file.exists() {
            self.write_atomic(&self.cache_file, b"[]")?;
            info!(path = %self.cache_file.display(), "Created empty cache snapshot");
        }

        debug!(
            cache_file = %self.cache_file.display(),
            content_dir = %self.content_dir.display(),
            "Cache store ready"
        );
        Ok(())
    }

    /// Read the persisted snapshot
    pub fn load(&self) -> Result<Cache, StorageError> {
        let data = fs::read_to_string(&self.cache_file).map_err(|source| StorageError::Read {
            path: self.cache_file.clone(),
            source,
        })?;

        let cache: Cache = serde_json::from_str(&data).map_err(|source| StorageError::Parse {
            path: self.cache_file.clone(),
            source,
        })?;

        debug!(entries = cache.len(), "Loaded cache snapshot");
        Ok(cache)
    }

    /// Replace the persisted snapshot with `cache`
    pub fn save(&self, cache: &Cache) -> Result<(), StorageError> {
        let content = serde_json::to_vec_pretty(cache).map_err(|e| StorageError::Write {
            path: self.cache_file.clone(),
            source: std::io::Error::other(e),
        })?;

        self.write_atomic(&self.cache_file, &content)?;

        debug!(entries = cache.len(), path = %self.cache_file.display(), "Saved cache snapshot");
        Ok(())
    }

    /// Write downloaded bytes as `local_name` in the content directory
    ///
    /// Overwrites an existing file of the same name.
    pub fn persist_content(&self, local_name: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.content_path(local_name)?;
        self.write_atomic(&path, bytes)?;

        debug!(file = local_name, size = bytes.len(), "Stored content");
        Ok(path)
    }

    /// Remove a content file
    ///
    /// # Returns
    /// `true` when a file was deleted, `false` when there was none
    pub fn remove_content(&self, local_name: &str) -> Result<bool, StorageError> {
        let path = self.content_path(local_name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(file = local_name, "Removed content");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StorageError::Write { path, source }),
        }
    }

    /// Whether a content file exists for `local_name`
    pub fn has_content(&self, local_name: &str) -> bool {
        self.content_path(local_name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Resolve a local name inside the content directory
    ///
    /// Names that would escape the directory are rejected.
    fn content_path(&self, local_name: &str) -> Result<PathBuf, StorageError> {
        if local_name.is_empty()
            || local_name == "."
            || local_name == ".."
            || local_name.contains(['/', '\\'])
        {
            return Err(StorageError::Write {
                path: self.content_dir.join(local_name),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "invalid local file name",
                ),
            });
        }
        Ok(self.content_dir.join(local_name))
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let parent = path.parent().unwrap_or(Path::new("."));
        let write_err = |source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".tmp")
            .tempfile_in(parent)
            .map_err(write_err)?;
        tmp.write_all(data).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(path).map_err(|e| write_err(e.error))?;

        Ok(())
    }
}

/// Remove temp files left from interrupted writes
fn cleanup_temp_files(dir: &Path) {
    let Ok(read_dir) = fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        let is_temp = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with(TEMP_PREFIX) && name.ends_with(".tmp"))
            .unwrap_or(false);
        if is_temp {
            debug!(path = %path.display(), "Removing stale temp file");
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove stale temp file");
            }
        }
    }
}
