//! Locale-keyed text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Human-readable text keyed by locale.
///
/// Manifests may give either a single string (used for every locale) or a
/// map from locale to text:
///
/// ```json
/// { "title": { "en": "Board", "ko": "게시판" }, "language": "ko" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Localized(BTreeMap<String, String>),
}

impl Default for LocalizedText {
    fn default() -> Self {
        Self::Localized(BTreeMap::new())
    }
}

impl LocalizedText {
    /// Resolve the text for `locale`, falling back to `default_locale`.
    pub fn resolve(&self, locale: &str, default_locale: Option<&str>) -> Option<&str> {
        match self {
            Self::Plain(text) => Some(text),
            Self::Localized(map) => map
                .get(locale)
                .or_else(|| default_locale.and_then(|d| map.get(d)))
                .map(String::as_str),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Plain(text) => text.is_empty(),
            Self::Localized(map) => map.is_empty(),
        }
    }
}
