use std::path::PathBuf;

/// Errors that can occur while loading or validating module manifests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failed to parse a manifest document.
    #[error("failed to parse manifest for '{module}': {message}")]
    ManifestParse { module: String, message: String },

    /// The manifest declares a name different from the directory it was
    /// loaded from.
    #[error("manifest in '{expected}' declares name '{declared}'")]
    IdentityMismatch { expected: String, declared: String },

    /// Invalid version string.
    #[error("invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    /// Invalid version requirement string.
    #[error("invalid version requirement '{constraint}': {reason}")]
    VersionConstraintParse { constraint: String, reason: String },

    /// A manifest field failed validation.
    #[error("invalid manifest for '{module}': {reason}")]
    InvalidManifest { module: String, reason: String },

    /// I/O error reading manifest files.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error from modreg-fs.
    #[error(transparent)]
    Fs(#[from] modreg_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
