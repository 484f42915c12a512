//! Module registry and lifecycle manager.
//!
//! This crate ties the manifest and storage layers together:
//!
//! - **Lifecycle**: dependency-checked, idempotent install/upgrade
//! - **Instantiation**: resolving installed modules into behavior handles
//! - **Templates**: module templates merged with site-theme overrides
//! - **Events**: an immutable subscription index built from the listing
//!
//! # Architecture
//!
//! ```text
//!                 ModuleRegistry
//!                       |
//!      +----------------+----------------+
//!      |                |                |
//! modreg-manifest  modreg-store      modreg-fs
//! ```

pub mod config;
pub mod config_values;
pub mod error;
pub mod events;
pub mod instance;
pub mod lifecycle;
pub mod registry;
pub mod templates;

pub use config::RegistryConfig;
pub use config_values::{coerce, reconcile};
pub use error::{Error, FailureKind, InstallError, ResolveError, Result};
pub use events::{EventIndex, EventIndexBuilder};
pub use instance::{
    DriftStatus, ImplementationRegistry, LoadedModuleContext, ModuleBehavior, ModuleFeature, ModuleHandle,
    ModuleInstantiator, ModuleLocation,
};
pub use lifecycle::LifecycleController;
pub use registry::{ContextModule, ModuleRegistry, ModuleRegistryBuilder};
pub use templates::{
    FsThemeSource, TemplateOrigin, TemplatePackage, TemplateRef, TemplateResolver, ThemeSource,
};
