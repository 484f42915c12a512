//! Identifier validation and directory enumeration.

use std::fs;
use std::path::Path;

use crate::{Error, Result};

/// Validate a directory-safe identifier (module, template, theme or
/// attachment namespace).
///
/// Identifiers are non-empty and contain only ASCII alphanumerics, `-`,
/// `_` and `.`, and are never `.` or `..`.
pub fn validate_identifier(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name == "." || name == ".." {
        Some("must not be a relative path component")
    } else if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        Some("must contain only alphanumeric characters, '-', '_' or '.'")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidIdentifier {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// List the names of the subdirectories of `dir` in enumeration order.
///
/// A missing or unreadable directory yields an empty list; entries that are
/// not directories or whose names are not valid UTF-8 are skipped. No
/// sorting is applied.
pub fn subdirectories(dir: &Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::trace!(?dir, error = %e, "Directory not readable, treating as empty");
            return Vec::new();
        }
    };

    entries
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect()
}
