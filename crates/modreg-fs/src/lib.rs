//! Filesystem helpers for the Module Registry
//!
//! Provides atomic writes, content checksums, format-agnostic config
//! loading and the directory conventions shared by every crate.

pub mod checksum;
pub mod config;
pub mod constants;
pub mod dir;
pub mod error;
pub mod io;

pub use checksum::{compute_content_checksum, compute_file_checksum};
pub use config::ConfigStore;
pub use constants::SitePath;
pub use dir::{subdirectories, validate_identifier};
pub use error::{Error, Result};
