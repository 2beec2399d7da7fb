use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sovereign_types::CanonicalKey;

use crate::canonicalizer::GatedKey;

/// A normalized signal: canonical scope, timestamp and bounded values.
///
/// Only the [`Normalizer`](crate::Normalizer) produces these.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Signal {
    scope: CanonicalKey,
    timestamp: DateTime<Utc>,
    values: BTreeMap<String, f64>,
}

impl Signal {
    pub(crate) fn new(
        scope: &GatedKey,
        timestamp: DateTime<Utc>,
        values: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            scope: scope.key().clone(),
            timestamp,
            values,
        }
    }

    pub fn scope(&self) -> &CanonicalKey {
        &self.scope
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn value(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }
}

/// Time-ordered normalized signals for one canonical scope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SignalWindow {
    scope: CanonicalKey,
    signals: Vec<Signal>,
}

impl SignalWindow {
    /// Signals are sorted by timestamp; ties keep their input order.
    pub(crate) fn new(scope: &GatedKey, mut signals: Vec<Signal>) -> Self {
        signals.sort_by_key(|s| s.timestamp);
        Self {
            scope: scope.key().clone(),
            signals,
        }
    }

    pub fn scope(&self) -> &CanonicalKey {
        &self.scope
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    /// The most recent `n` signals.
    pub fn tail(&self, n: usize) -> &[Signal] {
        let start = self.signals.len().saturating_sub(n);
        &self.signals[start..]
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.signals.last().map(|s| s.timestamp)
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}
