//! Error types for modreg-core

use modreg_manifest::DependencyViolation;

/// Result type for modreg-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Category of a failed registry operation, for callers that render a
/// specific message per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Manifest or module absent
    NotFound,
    /// Present on disk, never installed
    NotInstalled,
    /// Version or missing-dependency constraint violated
    Dependency,
    /// Schema or side-effect setup failed
    Provisioning,
    /// No implementation registered for the module
    ImplementationMissing,
    /// Manifest present but invalid
    InvalidManifest,
    /// A module implementation reported a failure of its own
    Behavior,
    /// Failure of the underlying storage or filesystem
    Storage,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::NotInstalled => "not_installed",
            Self::Dependency => "dependency",
            Self::Provisioning => "provisioning",
            Self::ImplementationMissing => "implementation_missing",
            Self::InvalidManifest => "invalid_manifest",
            Self::Behavior => "behavior",
            Self::Storage => "storage",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors of registry queries
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Module '{module}' not found")]
    ModuleNotFound { module: String },

    #[error("Module '{module}' failed: {message}")]
    Behavior { module: String, message: String },

    /// Filesystem error from modreg-fs
    #[error(transparent)]
    Fs(#[from] modreg_fs::Error),

    /// Manifest error from modreg-manifest
    #[error(transparent)]
    Manifest(#[from] modreg_manifest::Error),

    /// Storage error from modreg-store
    #[error(transparent)]
    Store(#[from] modreg_store::Error),
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ModuleNotFound { .. } => FailureKind::NotFound,
            Self::Behavior { .. } => FailureKind::Behavior,
            Self::Manifest(_) => FailureKind::InvalidManifest,
            Self::Fs(_) | Self::Store(_) => FailureKind::Storage,
        }
    }
}

/// Errors of [`crate::ModuleRegistry::install`]
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Module '{module}' has no manifest")]
    NotFound { module: String },

    #[error("Dependencies of '{module}' are not satisfied: {}", join_violations(.violations))]
    Dependency {
        module: String,
        violations: Vec<DependencyViolation>,
    },

    #[error("Provisioning {target} for '{module}' failed")]
    Provisioning {
        module: String,
        target: String,
        #[source]
        source: Box<Error>,
    },

    /// Manifest error from modreg-manifest
    #[error(transparent)]
    Manifest(#[from] modreg_manifest::Error),

    /// Storage error from modreg-store
    #[error(transparent)]
    Store(#[from] modreg_store::Error),
}

impl InstallError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Dependency { .. } => FailureKind::Dependency,
            Self::Provisioning { .. } => FailureKind::Provisioning,
            Self::Manifest(_) => FailureKind::InvalidManifest,
            Self::Store(_) => FailureKind::Storage,
        }
    }
}

/// Errors of [`crate::ModuleRegistry::resolve`]
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Module '{module}' not found")]
    NotFound { module: String },

    #[error("Module '{module}' is not installed")]
    NotInstalled { module: String },

    #[error("No implementation '{implementation}' registered for module '{module}'")]
    ImplementationMissing {
        module: String,
        implementation: String,
    },

    /// Manifest error from modreg-manifest
    #[error(transparent)]
    Manifest(#[from] modreg_manifest::Error),

    /// Storage error from modreg-store
    #[error(transparent)]
    Store(#[from] modreg_store::Error),
}

impl ResolveError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::NotInstalled { .. } => FailureKind::NotInstalled,
            Self::ImplementationMissing { .. } => FailureKind::ImplementationMissing,
            Self::Manifest(_) => FailureKind::InvalidManifest,
            Self::Store(_) => FailureKind::Storage,
        }
    }
}

fn join_violations(violations: &[DependencyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
