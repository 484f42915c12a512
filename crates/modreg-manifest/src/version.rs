//! Version requirement parsing and checking.
//!
//! Manifest dependency maps pair a dependency identifier with a
//! requirement. A bare version is a **minimum**: `"1.2"` means the installed
//! version must be `>= 1.2.0`. Explicit operators are also accepted and may
//! be comma-joined, all of which must match:
//!
//! ```
//! use modreg_manifest::version::VersionRequirement;
//!
//! let minimum = VersionRequirement::parse("3.0").unwrap();
//! assert!(minimum.satisfies("3.0.0"));
//! assert!(minimum.satisfies("3.2.1"));
//! assert!(!minimum.satisfies("2.9.9"));
//!
//! let range = VersionRequirement::parse(">=1.0,<2.0").unwrap();
//! assert!(range.satisfies("1.4.0"));
//! assert!(!range.satisfies("2.0.0"));
//! ```
//!
//! Dotted versions are normalized to semver: missing minor/patch components
//! default to `0`, and a fourth or later numeric component (`3.0.0.160907`)
//! is carried as build metadata so it still orders numerically.

use std::cmp::Ordering;

use crate::error::{Error, Result};

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone)]
struct Specifier {
    op: CompareOp,
    version: semver::Version,
}

impl Specifier {
    fn matches(&self, candidate: &semver::Version) -> bool {
        let ord = compare(candidate, &self.version);
        match self.op {
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Lte => ord != Ordering::Greater,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
        }
    }
}

/// A parsed version requirement that can be checked against concrete versions.
#[derive(Debug, Clone)]
pub struct VersionRequirement {
    specifiers: Vec<Specifier>,
    /// The original requirement string for display.
    raw: String,
}

impl VersionRequirement {
    /// Parse a requirement string such as `1.2.0`, `>=1.2`, or `>=1.0,<2.0`.
    pub fn parse(requirement: &str) -> Result<Self> {
        let raw = requirement.to_string();
        let mut specifiers = Vec::new();

        for part in requirement.split(',').map(str::trim) {
            if part.is_empty() {
                continue;
            }
            specifiers.push(parse_specifier(part)?);
        }

        if specifiers.is_empty() {
            return Err(Error::VersionConstraintParse {
                constraint: raw,
                reason: "empty requirement".to_string(),
            });
        }

        Ok(Self { specifiers, raw })
    }

    /// Check if a version string satisfies this requirement.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        match normalize_version(version) {
            Ok(parsed) => self.satisfies_version(&parsed),
            Err(_) => false,
        }
    }

    /// Check if a `semver::Version` satisfies this requirement.
    pub fn satisfies_version(&self, version: &semver::Version) -> bool {
        self.specifiers.iter().all(|spec| spec.matches(version))
    }

    /// Return the original requirement string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a single specifier like `>=3.12` or `<3.13.0`.
fn parse_specifier(s: &str) -> Result<Specifier> {
    let (op, version_str) = if let Some(rest) = s.strip_prefix(">=") {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = s.strip_prefix("<=") {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = s.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = s.strip_prefix("==") {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else {
        // Bare version is a minimum
        (CompareOp::Gte, s)
    };

    let version =
        normalize_version(version_str).map_err(|e| Error::VersionConstraintParse {
            constraint: s.to_string(),
            reason: e.to_string(),
        })?;

    Ok(Specifier { op, version })
}

/// Normalize a dotted version string to semver.
///
/// - `"3"` -> `3.0.0`
/// - `"3.12"` -> `3.12.0`
/// - `"3.0.0.160907"` -> `3.0.0+160907`
/// - `"1.0.0-beta.1"` -> parsed as-is
pub fn normalize_version(s: &str) -> Result<semver::Version> {
    let s = s.trim();
    let invalid = |reason: String| Error::InvalidVersion {
        version: s.to_string(),
        reason,
    };

    if let Ok(v) = semver::Version::parse(s) {
        return Ok(v);
    }

    let parts: Vec<&str> = s.split('.').collect();
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()))
    {
        return Err(invalid("expected dot-separated numeric components".to_string()));
    }

    let component = |idx: usize| -> Result<u64> {
        parts
            .get(idx)
            .map_or(Ok(0), |p| p.parse::<u64>())
            .map_err(|e| invalid(e.to_string()))
    };

    let mut version = semver::Version::new(component(0)?, component(1)?, component(2)?);
    if parts.len() > 3 {
        version.build =
            semver::BuildMetadata::new(&parts[3..].join(".")).map_err(|e| invalid(e.to_string()))?;
    }
    Ok(version)
}

/// Total order used for requirement checks.
///
/// Semver precedence ignores build metadata, so it is used as the final
/// tie-breaker to keep four-component versions ordered.
fn compare(a: &semver::Version, b: &semver::Version) -> Ordering {
    a.cmp_precedence(b).then_with(|| a.build.cmp(&b.build))
}
