//! Error types for modreg-store

use std::path::PathBuf;

/// Result type for modreg-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in storage and installed-state operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Table '{table}' does not exist in partition '{partition}'")]
    TableNotFound { partition: String, table: String },

    #[error("Invalid schema for table '{table}': {reason}")]
    InvalidSchema { table: String, reason: String },

    #[error("Unknown column '{column}' in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Row for table '{table}' is missing key column '{column}'")]
    MissingKey { table: String, column: String },

    #[error("Duplicate value for index '{index}' in table '{table}'")]
    DuplicateKey { table: String, index: String },

    #[error("Malformed row in table '{table}': {message}")]
    MalformedRow { table: String, message: String },

    #[error("Corrupt storage file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    /// Filesystem error from modreg-fs
    #[error(transparent)]
    Fs(#[from] modreg_fs::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
