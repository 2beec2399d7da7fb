use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Case/whitespace normalisation applied to every identifier before lookup.
///
/// Strips surrounding whitespace and upper-cases. Nothing else: no exchange
/// suffix guessing, no vendor quirks.
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Stable internal identity that every alias resolves to.
///
/// Always stored in normalised form, so two keys built from `"sp500"` and
/// `" SP500 "` compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(normalize_identifier(raw.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CanonicalKey {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for CanonicalKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<CanonicalKey> for String {
    fn from(key: CanonicalKey) -> Self {
        key.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A canonical key plus the external spellings that collapse onto it.
///
/// Built once from configuration; immutable for the rest of the run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "canonical")]
    pub key: CanonicalKey,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
}

impl Identity {
    pub fn new(key: impl AsRef<str>) -> Self {
        Self {
            key: CanonicalKey::new(key),
            aliases: BTreeSet::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl AsRef<str>) -> Self {
        self.aliases.insert(normalize_identifier(alias.as_ref()));
        self
    }

    /// Every spelling that resolves to this identity, the key itself first.
    pub fn spellings(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(self.key.as_str().to_string())
            .chain(self.aliases.iter().map(|a| normalize_identifier(a)))
    }
}
