//! Well-known directory and file names of a module site.

use std::path::Path;

/// Standard site filesystem markers and paths.
///
/// ```text
/// <root>/
///   modules/<module>/package.json
///   modules/<module>/templets/<template>/package.json
///   templets/<theme>/templets/modules/<module>/templets/<template>/package.json
///   attachments/<namespace>/
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitePath {
    /// The `modules` directory holding one directory per module
    Modules,
    /// The `templets` directory (module templates and site themes)
    Templates,
    /// The `modules` directory inside a theme's `templets` directory
    ThemeModules,
    /// The `attachments` directory (default attachment root)
    Attachments,
    /// The default manifest file name
    Manifest,
}

impl SitePath {
    /// Get the string representation of the path.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modules => "modules",
            Self::Templates => "templets",
            Self::ThemeModules => "templets/modules",
            Self::Attachments => "attachments",
            Self::Manifest => "package.json",
        }
    }
}

impl AsRef<Path> for SitePath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for SitePath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for SitePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
