use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use sovereign_types::{normalize_identifier, CanonicalKey, GovernanceError, GovernanceResult, Identity};
use tracing::debug;

use crate::error::GateError;

/// Proof that an identity went through the canonicalizer.
///
/// Only [`Canonicalizer::resolve`] constructs one, and it deliberately does
/// not implement `Deserialize`. Every post-gate operation takes a `GatedKey`,
/// so working on a non-canonical identity does not compile.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct GatedKey(CanonicalKey);

impl GatedKey {
    pub fn key(&self) -> &CanonicalKey {
        &self.0
    }

    pub fn into_key(self) -> CanonicalKey {
        self.0
    }
}

impl AsRef<CanonicalKey> for GatedKey {
    fn as_ref(&self) -> &CanonicalKey {
        &self.0
    }
}

impl fmt::Display for GatedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Resolves external identifiers to canonical identities.
///
/// The table is built once and never changes. Every canonical key resolves
/// to itself, and each alias resolves to exactly one key; a table where one
/// spelling would reach two keys is refused at construction.
#[derive(Clone, Debug, Default)]
pub struct Canonicalizer {
    table: HashMap<String, CanonicalKey>,
    keys: BTreeSet<CanonicalKey>,
}

impl Canonicalizer {
    pub fn new(identities: impl IntoIterator<Item = Identity>) -> Result<Self, GateError> {
        let mut table: HashMap<String, CanonicalKey> = HashMap::new();
        let mut keys = BTreeSet::new();

        for identity in identities {
            if identity.key.as_str().is_empty() {
                return Err(GateError::EmptyIdentifier);
            }
            for spelling in identity.spellings() {
                if spelling.is_empty() {
                    return Err(GateError::EmptyIdentifier);
                }
                match table.get(&spelling) {
                    Some(existing) if *existing != identity.key => {
                        return Err(GateError::AliasConflict {
                            alias: spelling,
                            existing: existing.to_string(),
                            conflicting: identity.key.to_string(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        table.insert(spelling, identity.key.clone());
                    }
                }
            }
            keys.insert(identity.key);
        }

        debug!(identities = keys.len(), spellings = table.len(), "Identity table loaded");
        Ok(Self { table, keys })
    }

    /// Resolve an identifier (case- and whitespace-insensitive).
    ///
    /// A miss is a hard rejection; there is no fallback key.
    pub fn resolve(&self, identifier: &str) -> GovernanceResult<GatedKey> {
        let normalized = normalize_identifier(identifier);
        self.table
            .get(&normalized)
            .cloned()
            .map(GatedKey)
            .ok_or_else(|| GovernanceError::UnknownIdentifier(identifier.to_string()))
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.table.contains_key(&normalize_identifier(identifier))
    }

    /// Canonical keys in the table, in order.
    pub fn keys(&self) -> impl Iterator<Item = &CanonicalKey> {
        self.keys.iter()
    }

    /// Number of canonical identities.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
pub(crate) fn gated(key: &str) -> GatedKey {
    GatedKey(CanonicalKey::new(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> Canonicalizer {
        Canonicalizer::new(vec![
            Identity::new("SP500").with_alias("SPY").with_alias("^GSPC").with_alias("spx"),
            Identity::new("NDX").with_alias("QQQ"),
        ])
        .unwrap()
    }

    #[test]
    fn aliases_collapse_to_one_key() {
        let canon = table();
        for spelling in ["SPY", "spy", " ^gspc ", "SPX", "sp500"] {
            assert_eq!(canon.resolve(spelling).unwrap().key().as_str(), "SP500");
        }
        assert_eq!(canon.resolve("qqq").unwrap().key().as_str(), "NDX");
    }

    #[test]
    fn unknown_identifier_is_rejected() {
        let err = table().resolve("AAPL").unwrap_err();
        assert_eq!(err, GovernanceError::UnknownIdentifier("AAPL".into()));
    }

    #[test]
    fn conflicting_alias_is_refused() {
        let err = Canonicalizer::new(vec![
            Identity::new("SP500").with_alias("SPX"),
            Identity::new("SPX_FUT").with_alias("spx"),
        ])
        .unwrap_err();
        assert!(matches!(err, GateError::AliasConflict { alias, .. } if alias == "SPX"));
    }

    #[test]
    fn alias_equal_to_other_key_is_refused() {
        let err = Canonicalizer::new(vec![
            Identity::new("SP500"),
            Identity::new("NDX").with_alias("sp500"),
        ])
        .unwrap_err();
        assert!(matches!(err, GateError::AliasConflict { .. }));
    }

    #[test]
    fn repeated_identity_is_accepted() {
        let canon = Canonicalizer::new(vec![
            Identity::new("SP500").with_alias("SPY"),
            Identity::new("sp500").with_alias("SPY"),
        ])
        .unwrap();
        assert_eq!(canon.len(), 1);
    }

    #[test]
    fn empty_identifier_is_refused() {
        assert_eq!(
            Canonicalizer::new(vec![Identity::new("  ")]).unwrap_err(),
            GateError::EmptyIdentifier
        );
    }

    proptest! {
        #[test]
        fn canonicalization_is_idempotent(
            entries in prop::collection::btree_map(
                "[A-Z]{2,6}",
                prop::collection::btree_set("[a-z]{2,6}[0-9]", 0..4),
                1..8,
            )
        ) {
            let identities: Vec<Identity> = entries
                .iter()
                .map(|(key, aliases)| {
                    aliases.iter().fold(Identity::new(key), |id, a| id.with_alias(a))
                })
                .collect();
            let built = Canonicalizer::new(identities.clone());
            prop_assume!(built.is_ok());
            let canon = built.unwrap();

            for identity in &identities {
                let once = canon.resolve(identity.key.as_str()).unwrap();
                let twice = canon.resolve(once.key().as_str()).unwrap();
                prop_assert_eq!(&once, &twice);
                prop_assert_eq!(once.key(), &identity.key);
            }
        }

        #[test]
        fn every_alias_resolves_to_exactly_its_key(
            entries in prop::collection::btree_map(
                "[A-Z]{2,6}",
                prop::collection::btree_set("[a-z]{2,6}[0-9]", 1..4),
                1..8,
            )
        ) {
            let identities: Vec<Identity> = entries
                .iter()
                .map(|(key, aliases)| {
                    aliases.iter().fold(Identity::new(key), |id, a| id.with_alias(a))
                })
                .collect();

            // Aliases end in a digit and keys never do, so no spelling is shared
            // across identities unless two aliases coincide.
            match Canonicalizer::new(identities.clone()) {
                Ok(canon) => {
                    for identity in &identities {
                        for alias in &identity.aliases {
                            let gated = canon.resolve(alias).unwrap();
                            prop_assert_eq!(gated.key(), &identity.key);
                        }
                    }
                }
                Err(GateError::AliasConflict { .. }) => {}
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
    }
}
