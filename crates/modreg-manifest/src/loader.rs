//! Read-through manifest loader.
//!
//! Manifests are parsed once per loader and kept for its lifetime: the
//! first successful load of an identifier wins and later edits of the file
//! are not observed by [`ManifestLoader::load`]. [`ManifestLoader::reload`]
//! re-reads the file, replaces the cached entry and returns the hash of the
//! exact bytes it parsed. [`ManifestLoader::hash`] always hashes the file
//! currently on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use modreg_fs::{SitePath, compute_content_checksum, io, validate_identifier};

use crate::error::{Error, Result};
use crate::manifest::ModuleManifest;

/// A manifest together with the content hash of the bytes it was parsed from.
#[derive(Debug, Clone)]
pub struct ManifestSnapshot {
    pub manifest: Arc<ModuleManifest>,
    pub hash: String,
}

/// Loads and caches module manifests from `<modules_dir>/<id>/<file_name>`.
#[derive(Debug)]
pub struct ManifestLoader {
    modules_dir: PathBuf,
    file_name: String,
    cache: RwLock<HashMap<String, Arc<ModuleManifest>>>,
}

impl ManifestLoader {
    /// Create a loader for the module directories under `modules_dir`.
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            file_name: SitePath::Manifest.as_str().to_string(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Use a manifest file name other than `package.json`.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Directory of module `id`.
    pub fn module_path(&self, id: &str) -> PathBuf {
        self.modules_dir.join(id)
    }

    /// Path of the manifest file of module `id`.
    pub fn manifest_path(&self, id: &str) -> PathBuf {
        self.module_path(id).join(&self.file_name)
    }

    /// Load the manifest of module `id`.
    ///
    /// Returns `Ok(None)` when the module has no manifest file; this is an
    /// expected outcome, not an error.
    pub fn load(&self, id: &str) -> Result<Option<Arc<ModuleManifest>>> {
        validate_identifier(id)?;

        if let Some(cached) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return Ok(Some(Arc::clone(cached)));
        }

        let Some((manifest, _)) = self.read(id)? else {
            return Ok(None);
        };

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.entry(id.to_string()).or_insert(manifest);
        Ok(Some(Arc::clone(entry)))
    }

    /// Re-read module `id`'s manifest from disk and replace the cached entry.
    ///
    /// The returned hash covers the bytes the manifest was parsed from. A
    /// missing file returns `Ok(None)` and leaves the cache untouched.
    pub fn reload(&self, id: &str) -> Result<Option<ManifestSnapshot>> {
        validate_identifier(id)?;

        let Some((manifest, hash)) = self.read(id)? else {
            return Ok(None);
        };

        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), Arc::clone(&manifest));
        Ok(Some(ManifestSnapshot { manifest, hash }))
    }

    fn read(&self, id: &str) -> Result<Option<(Arc<ModuleManifest>, String)>> {
        let path = self.manifest_path(id);
        let Some(content) = io::read_text_if_exists(&path)? else {
            tracing::debug!(module = %id, ?path, "No manifest found");
            return Ok(None);
        };

        let manifest = Arc::new(ModuleManifest::from_json(id, &content)?);
        tracing::debug!(module = %id, version = %manifest.version, "Loaded manifest");
        Ok(Some((manifest, compute_content_checksum(&content))))
    }

    /// Compute the content hash of module `id`'s manifest file.
    ///
    /// Never cached. Returns `Ok(None)` when the manifest file is absent.
    pub fn hash(&self, id: &str) -> Result<Option<String>> {
        validate_identifier(id)?;
        let path = self.manifest_path(id);
        modreg_fs::compute_file_checksum(&path).map_err(|source| Error::Io { path, source })
    }

    /// Whether a manifest for `id` is held in the cache.
    pub fn is_cached(&self, id: &str) -> bool {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}
