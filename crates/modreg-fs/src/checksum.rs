//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! manifest drift detection. Checksums are never cached: every call reads
//! the bytes currently on disk.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of raw content.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_content_checksum(content: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_ref());
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// Returns `Ok(None)` when the file does not exist, so callers can treat a
/// missing manifest as a normal outcome.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn compute_file_checksum(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read(path) {
        Ok(content) => Ok(Some(compute_content_checksum(content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
