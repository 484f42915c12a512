//! Module manifests for the Module Registry.
//!
//! This crate provides the package descriptor model (`package.json`), a
//! read-through manifest loader, version requirement parsing, and the
//! dependency checker that gates installation.

pub mod dependency;
pub mod error;
pub mod loader;
pub mod locale;
pub mod manifest;
pub mod schema;
pub mod targets;
pub mod version;

pub use dependency::{CORE_DEPENDENCY, DependencyChecker, DependencyViolation, InstalledVersions};
pub use error::{Error, Result};
pub use loader::{ManifestLoader, ManifestSnapshot};
pub use locale::LocalizedText;
pub use manifest::{Capability, CapabilityFlags, ModuleManifest};
pub use schema::{ColumnSpec, ConfigField, ConfigType, IndexKind, TableSchema};
pub use targets::{CallerScope, Callers, EventTargets, Subscription, WILDCARD};
pub use version::{VersionRequirement, normalize_version};
