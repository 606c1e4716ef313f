//! Language codes and language-keyed value maps.
//!
//! Multilingual content is always carried as an explicit
//! [`LanguageMap`] rather than a `title_en` / `title_sl` key-suffix
//! convention. The suffix convention is only parsed at the legacy adapter
//! edge of the importer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]{2,3}(-[a-z]{2})?$").expect("valid regex"))
}

// ---------------------------------------------------------------------------
// LanguageCode
// ---------------------------------------------------------------------------

/// A normalized (lowercase, `_` replaced by `-`) language code such as `en`
/// or `pt-br`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let normalized = raw.trim().to_ascii_lowercase().replace('_', "-");
        if !code_pattern().is_match(&normalized) {
            return Err(CoreError::Validation(format!(
                "Invalid language code '{raw}'"
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<LanguageCode> for String {
    fn from(value: LanguageCode) -> Self {
        value.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a list of raw codes, rejecting the whole list on the first bad entry.
pub fn parse_codes<S: AsRef<str>>(raw: &[S]) -> Result<Vec<LanguageCode>, CoreError> {
    raw.iter().map(|c| LanguageCode::parse(c.as_ref())).collect()
}

// ---------------------------------------------------------------------------
// LanguageMap
// ---------------------------------------------------------------------------

/// Ordered language → value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageMap<T>(BTreeMap<LanguageCode, T>);

impl<T> Default for LanguageMap<T> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<T> LanguageMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lang: &LanguageCode) -> Option<&T> {
        self.0.get(lang)
    }

    pub fn insert(&mut self, lang: LanguageCode, value: T) -> Option<T> {
        self.0.insert(lang, value)
    }

    pub fn contains(&self, lang: &LanguageCode) -> bool {
        self.0.contains_key(lang)
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageCode> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LanguageCode, &T)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl LanguageMap<String> {
    /// Value for `lang`, treating blank strings as absent.
    pub fn text(&self, lang: &LanguageCode) -> Option<&str> {
        self.get(lang).map(String::as_str).filter(|s| !s.trim().is_empty())
    }

    /// Languages with a non-blank value.
    pub fn filled_languages(&self) -> impl Iterator<Item = &LanguageCode> {
        self.0
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, _)| k)
    }
}

impl<T> FromIterator<(LanguageCode, T)> for LanguageMap<T> {
    fn from_iter<I: IntoIterator<Item = (LanguageCode, T)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for LanguageMap<T> {
    type Item = (LanguageCode, T);
    type IntoIter = std::collections::btree_map::IntoIter<LanguageCode, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
