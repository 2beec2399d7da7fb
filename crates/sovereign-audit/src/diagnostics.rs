use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovereign_types::{AuthorityId, CanonicalKey, GrantId};
use tracing::warn;
use uuid::Uuid;

/// What a delegated holder tried to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptKind {
    Proposal,
    Breach,
    /// Direct emission of a binding decision. Never permitted.
    Binding,
}

/// A delegated action that was discarded as never having occurred.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvalidatedAttempt {
    /// Position in the diagnostic log. Independent of audit sequence numbers.
    pub sequence: u64,
    /// When the attempt was discarded.
    pub at: DateTime<Utc>,
    /// The decision cycle the attempt was submitted to.
    pub cycle_id: Uuid,
    /// Delegated authority that made the attempt.
    pub holder: AuthorityId,
    /// Grant the holder acted under, when it named one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant: Option<GrantId>,
    /// Canonical scope the attempt targeted.
    pub scope: CanonicalKey,
    /// What was attempted.
    pub kind: AttemptKind,
    /// Why the attempt was invalidated.
    pub reason: String,
}

/// Log of invalidated attempts, kept apart from the audit trace so that
/// decision replay never observes them.
///
/// Append-only like the trace, but carries no hash chain: it is a diagnostic
/// aid, not a record of authority.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: RwLock<Vec<InvalidatedAttempt>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invalidated attempt and return its diagnostic sequence.
    pub fn record(
        &self,
        cycle_id: Uuid,
        holder: AuthorityId,
        grant: Option<GrantId>,
        scope: CanonicalKey,
        kind: AttemptKind,
        reason: impl Into<String>,
    ) -> u64 {
        let reason = reason.into();
        warn!(
            cycle_id = %cycle_id,
            holder = %holder,
            scope = %scope,
            kind = ?kind,
            reason = %reason,
            "Invalidated delegated attempt"
        );

        // The log only ever grows; a poisoned lock still holds a consistent Vec.
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let sequence = entries.len() as u64 + 1;
        entries.push(InvalidatedAttempt {
            sequence,
            at: Utc::now(),
            cycle_id,
            holder,
            grant,
            scope,
            kind,
            reason,
        });
        sequence
    }

    pub fn entries(&self) -> Vec<InvalidatedAttempt> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
