use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovereign_types::{BreachSignal, CanonicalKey, Decision, RoutingProposal};
use uuid::Uuid;

use crate::error::AuditError;

/// `prev_hash` of the first record.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// The artifact an audit record carries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AuditEntry {
    /// An input refused at the gate.
    Rejection {
        identifier: String,
        /// The cycle's scope, when it was already resolved.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<CanonicalKey>,
        code: String,
        reason: String,
    },
    Proposal { proposal: RoutingProposal },
    Breach {
        scope: CanonicalKey,
        breach: BreachSignal,
    },
    Decision { decision: Decision },
}

impl AuditEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            AuditEntry::Rejection { .. } => "rejection",
            AuditEntry::Proposal { .. } => "proposal",
            AuditEntry::Breach { .. } => "breach",
            AuditEntry::Decision { .. } => "decision",
        }
    }

    pub fn decision(&self) -> Option<&Decision> {
        match self {
            AuditEntry::Decision { decision } => Some(decision),
            _ => None,
        }
    }
}

/// One appended record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the trace, starting at 1 with no gaps.
    pub sequence: u64,
    /// When the record was appended.
    pub timestamp: DateTime<Utc>,
    /// The decision cycle that produced the record.
    pub cycle_id: Uuid,
    /// The artifact being recorded.
    pub entry: AuditEntry,
    /// `record_hash` of the preceding record, or [`GENESIS_HASH`] for the first.
    pub prev_hash: String,
    /// Hex BLAKE3 hash over every other field of this record.
    pub record_hash: String,
}

/// Everything except `record_hash`, in the order it is hashed.
#[derive(Serialize)]
struct HashedBody<'a> {
    sequence: u64,
    timestamp: &'a DateTime<Utc>,
    cycle_id: &'a Uuid,
    entry: &'a AuditEntry,
    prev_hash: &'a str,
}

impl AuditRecord {
    pub(crate) fn seal(
        sequence: u64,
        timestamp: DateTime<Utc>,
        cycle_id: Uuid,
        entry: AuditEntry,
        prev_hash: String,
    ) -> Result<Self, AuditError> {
        let record_hash = compute_hash(sequence, &timestamp, &cycle_id, &entry, &prev_hash)?;
        Ok(Self {
            sequence,
            timestamp,
            cycle_id,
            entry,
            prev_hash,
            record_hash,
        })
    }

    /// Recompute this record's hash from its content.
    pub fn expected_hash(&self) -> Result<String, AuditError> {
        compute_hash(
            self.sequence,
            &self.timestamp,
            &self.cycle_id,
            &self.entry,
            &self.prev_hash,
        )
    }
}

fn compute_hash(
    sequence: u64,
    timestamp: &DateTime<Utc>,
    cycle_id: &Uuid,
    entry: &AuditEntry,
    prev_hash: &str,
) -> Result<String, AuditError> {
    let body = serde_json::to_vec(&HashedBody {
        sequence,
        timestamp,
        cycle_id,
        entry,
        prev_hash,
    })
    .map_err(|e| AuditError::Serialization(e.to_string()))?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(b"sovereign-audit-v1:");
    hasher.update(&body);
    Ok(hasher.finalize().to_hex().to_string())
}
