use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Untrusted signal input as it arrives from ingestion.
///
/// Nothing about it is trusted: the identifier is an arbitrary external
/// spelling and the field values are unbounded until the gate normalises them.
/// Fields are kept in a `BTreeMap` so iteration order is stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSignal {
    /// External spelling of the scope, before canonicalization.
    pub identifier: String,
    /// Observation time reported by the source.
    pub timestamp: DateTime<Utc>,
    /// Field values by name. Names are matched ignoring ASCII case.
    #[serde(default)]
    pub fields: BTreeMap<String, f64>,
}

impl RawSignal {
    pub fn new(identifier: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}
