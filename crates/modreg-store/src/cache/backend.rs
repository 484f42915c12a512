//! Key/value stores for cached payloads.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use modreg_fs::{io, validate_identifier};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

/// A cached payload and the time it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub stored_at: DateTime<Utc>,
    pub payload: Value,
}

/// Storage for cache entries.
///
/// Backends only store; freshness policy belongs to the caller.
pub trait CacheBackend: Send + Sync + Debug {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn store(&self, key: &str, entry: &CacheEntry) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheBackend for MemoryCache {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn store(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Cache persisted as `<dir>/<key>.json`, shared by every process using the
/// same directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        validate_identifier(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl CacheBackend for FileCache {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path(key)?;
        let Some(content) = io::read_text_if_exists(&path)? else {
            return Ok(None);
        };
        match serde_json::from_str(&content) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                // An unreadable entry is a miss; the next store overwrites it
                tracing::warn!(?path, error = %e, "Ignoring corrupt cache entry");
                Ok(None)
            }
        }
    }

    fn store(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let path = self.path(key)?;
        io::write_text(&path, &serde_json::to_string(entry)?)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(modreg_fs::Error::io(path, e).into()),
        }
    }
}
