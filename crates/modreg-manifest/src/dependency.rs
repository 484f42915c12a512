//! Dependency constraint checking.
//!
//! A manifest's `dependencies` map is checked entry by entry against what
//! is currently installed. This is a direct constraint check, not a
//! solver: nothing is installed or reordered to make it pass.
//!
//! The reserved id [`CORE_DEPENDENCY`] is compared against the running
//! platform version instead of an installed module.

use std::collections::HashMap;
use std::convert::Infallible;

use crate::manifest::ModuleManifest;
use crate::version::VersionRequirement;

/// Dependency id reserved for the platform itself.
pub const CORE_DEPENDENCY: &str = "core";

/// Source of installed module versions.
pub trait InstalledVersions {
    type Error;

    /// Installed version of `module`, or `None` if it is not installed.
    fn installed_version(&self, module: &str) -> Result<Option<String>, Self::Error>;
}

impl InstalledVersions for HashMap<String, String> {
    type Error = Infallible;

    fn installed_version(&self, module: &str) -> Result<Option<String>, Infallible> {
        Ok(self.get(module).cloned())
    }
}

/// A dependency entry that is not satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyViolation {
    /// The platform is older than required.
    CoreTooOld { required: String, running: String },
    /// The dependency module is not installed.
    Missing { module: String, required: String },
    /// The dependency module is installed at a version that is too old.
    Outdated {
        module: String,
        required: String,
        installed: String,
    },
    /// The requirement string could not be parsed.
    Unparsable { module: String, requirement: String },
}

impl std::fmt::Display for DependencyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CoreTooOld { required, running } => {
                write!(f, "platform {running} does not satisfy core {required}")
            }
            Self::Missing { module, required } => {
                write!(f, "{module} {required} is not installed")
            }
            Self::Outdated {
                module,
                required,
                installed,
            } => write!(f, "{module} {installed} does not satisfy {required}"),
            Self::Unparsable {
                module,
                requirement,
            } => write!(f, "{module}: unparsable requirement '{requirement}'"),
        }
    }
}

/// Checks manifest dependencies against the platform and installed modules.
#[derive(Debug, Clone)]
pub struct DependencyChecker {
    platform_version: String,
}

impl DependencyChecker {
    pub fn new(platform_version: impl Into<String>) -> Self {
        Self {
            platform_version: platform_version.into(),
        }
    }

    pub fn platform_version(&self) -> &str {
        &self.platform_version
    }

    /// Whether every dependency is satisfied. Stops at the first failure.
    pub fn check<I>(&self, manifest: &ModuleManifest, installed: &I) -> Result<bool, I::Error>
    where
        I: InstalledVersions + ?Sized,
    {
        for (dependency, requirement) in &manifest.dependencies {
            if let Some(violation) = self.evaluate(dependency, requirement, installed)? {
                tracing::debug!(module = %manifest.id(), %violation, "Dependency not satisfied");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Every unsatisfied dependency, in dependency-id order.
    pub fn violations<I>(
        &self,
        manifest: &ModuleManifest,
        installed: &I,
    ) -> Result<Vec<DependencyViolation>, I::Error>
    where
        I: InstalledVersions + ?Sized,
    {
        let mut violations = Vec::new();
        for (dependency, requirement) in &manifest.dependencies {
            if let Some(violation) = self.evaluate(dependency, requirement, installed)? {
                violations.push(violation);
            }
        }
        Ok(violations)
    }

    fn evaluate<I>(
        &self,
        dependency: &str,
        requirement: &str,
        installed: &I,
    ) -> Result<Option<DependencyViolation>, I::Error>
    where
        I: InstalledVersions + ?Sized,
    {
        let Ok(parsed) = VersionRequirement::parse(requirement) else {
            return Ok(Some(DependencyViolation::Unparsable {
                module: dependency.to_string(),
                requirement: requirement.to_string(),
            }));
        };

        if dependency == CORE_DEPENDENCY {
            if parsed.satisfies(&self.platform_version) {
                return Ok(None);
            }
            return Ok(Some(DependencyViolation::CoreTooOld {
                required: requirement.to_string(),
                running: self.platform_version.clone(),
            }));
        }

        match installed.installed_version(dependency)? {
            None => Ok(Some(DependencyViolation::Missing {
                module: dependency.to_string(),
                required: requirement.to_string(),
            })),
            Some(version) if parsed.satisfies(&version) => Ok(None),
            Some(version) => Ok(Some(DependencyViolation::Outdated {
                module: dependency.to_string(),
                required: requirement.to_string(),
                installed: version,
            })),
        }
    }
}
