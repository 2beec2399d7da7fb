use std::ops::RangeBounds;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use ed25519_dalek::VerifyingKey;
use sovereign_types::{
    AuthorityId, BreachSignal, CanonicalKey, Decision, GovernanceError, RoutingProposal, Ruling,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::diagnostics::DiagnosticLog;
use crate::error::AuditError;
use crate::reader::AuditReader;
use crate::record::{AuditEntry, AuditRecord, GENESIS_HASH};
use crate::signing::{key_fingerprint, verify_decision, verify_ruling};

/// Append-only, hash-chained audit trace.
///
/// Appends are serialized by a write lock; reads run concurrently and only
/// ever hand out copies, so nothing outside can alter an appended record.
/// `anchor` is Alpha's verifying key; every decision must be signed by it.
#[derive(Debug)]
pub struct AuditTrace {
    alpha: AuthorityId,
    anchor: VerifyingKey,
    records: RwLock<Vec<AuditRecord>>,
    diagnostics: DiagnosticLog,
}

impl AuditTrace {
    pub fn new(alpha: AuthorityId, anchor: VerifyingKey) -> Self {
        Self {
            alpha,
            anchor,
            records: RwLock::new(Vec::new()),
            diagnostics: DiagnosticLog::new(),
        }
    }

    /// Rebuild a trace from an exported record stream.
    ///
    /// Every record is checked against the chain; a gap, an edited record, a
    /// reordered stream or a decision not signed by `anchor` is refused.
    pub fn replay(
        alpha: AuthorityId,
        anchor: VerifyingKey,
        records: impl IntoIterator<Item = AuditRecord>,
    ) -> Result<Self, AuditError> {
        let records: Vec<AuditRecord> = records.into_iter().collect();
        verify(&alpha, &anchor, &records)?;
        info!(
            records = records.len(),
            anchor = %key_fingerprint(&anchor),
            "Audit trace replayed"
        );
        Ok(Self {
            alpha,
            anchor,
            records: RwLock::new(records),
            diagnostics: DiagnosticLog::new(),
        })
    }

    pub fn alpha(&self) -> &AuthorityId {
        &self.alpha
    }

    pub fn anchor(&self) -> &VerifyingKey {
        &self.anchor
    }

    pub fn append_rejection(
        &self,
        cycle_id: Uuid,
        identifier: impl Into<String>,
        scope: Option<CanonicalKey>,
        err: &GovernanceError,
    ) -> Result<u64, AuditError> {
        let entry = AuditEntry::Rejection {
            identifier: identifier.into(),
            scope,
            code: err.code().to_string(),
            reason: err.to_string(),
        };
        self.append(cycle_id, |_| Ok(entry)).map(|(seq, _)| seq)
    }

    pub fn append_proposal(
        &self,
        cycle_id: Uuid,
        proposal: &RoutingProposal,
    ) -> Result<u64, AuditError> {
        let entry = AuditEntry::Proposal {
            proposal: proposal.clone(),
        };
        self.append(cycle_id, |_| Ok(entry)).map(|(seq, _)| seq)
    }

    pub fn append_breach(
        &self,
        cycle_id: Uuid,
        scope: &CanonicalKey,
        breach: &BreachSignal,
    ) -> Result<u64, AuditError> {
        let entry = AuditEntry::Breach {
            scope: scope.clone(),
            breach: breach.clone(),
        };
        self.append(cycle_id, |_| Ok(entry)).map(|(seq, _)| seq)
    }

    /// Seal Alpha's ruling into a decision and append it.
    ///
    /// The decision's sequence number is the record's sequence number. A
    /// ruling from any issuer other than Alpha, or one not signed by the
    /// anchor key, is refused before anything is written.
    pub fn append_decision(&self, cycle_id: Uuid, ruling: Ruling) -> Result<Decision, AuditError> {
        if *ruling.issuer() != self.alpha {
            error!(
                issuer = %ruling.issuer(),
                scope = %ruling.scope(),
                "Refused decision from non-Alpha issuer"
            );
            return Err(AuditError::IssuerNotAlpha {
                issuer: ruling.issuer().clone(),
                scope: ruling.scope().clone(),
            });
        }
        if let Err(reason) = verify_ruling(&ruling, &self.anchor) {
            error!(scope = %ruling.scope(), %reason, "Refused unsigned decision");
            return Err(AuditError::UnsignedDecision {
                scope: ruling.scope().clone(),
                reason,
            });
        }

        let (sequence, record) = self.append(cycle_id, move |sequence| {
            let decision = ruling.seal(sequence, Utc::now());
            Ok(AuditEntry::Decision { decision })
        })?;
        let decision = match record.entry {
            AuditEntry::Decision { decision } => decision,
            _ => return Err(AuditError::ChainBroken { sequence }),
        };

        info!(
            sequence,
            scope = %decision.scope(),
            action = %decision.action().label(),
            "Decision appended"
        );
        Ok(decision)
    }

    /// Append under the write lock. `build` receives the sequence number the
    /// record will carry.
    fn append(
        &self,
        cycle_id: Uuid,
        build: impl FnOnce(u64) -> Result<AuditEntry, AuditError>,
    ) -> Result<(u64, AuditRecord), AuditError> {
        let mut records = self.records.write().map_err(|_| AuditError::LockPoisoned)?;
        let sequence = records.len() as u64 + 1;
        let prev_hash = records
            .last()
            .map(|r| r.record_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let entry = build(sequence)?;
        let kind = entry.kind();
        let record = AuditRecord::seal(sequence, Utc::now(), cycle_id, entry, prev_hash)?;
        records.push(record.clone());

        debug!(sequence, kind, cycle_id = %cycle_id, "Audit record appended");
        Ok((sequence, record))
    }

    /// Records whose sequence number falls in `range`.
    pub fn read(&self, range: impl RangeBounds<u64>) -> Vec<AuditRecord> {
        self.snapshot()
            .into_iter()
            .filter(|r| range.contains(&r.sequence))
            .collect()
    }

    /// Decision history, in sequence order.
    pub fn decisions(&self) -> Vec<Decision> {
        self.snapshot()
            .into_iter()
            .filter_map(|r| match r.entry {
                AuditEntry::Decision { decision } => Some(decision),
                _ => None,
            })
            .collect()
    }

    /// The full record stream, for export.
    pub fn export(&self) -> Vec<AuditRecord> {
        self.snapshot()
    }

    /// Re-derive every hash and check the chain.
    pub fn verify_chain(&self) -> Result<(), AuditError> {
        let records = self.records.read().map_err(|_| AuditError::LockPoisoned)?;
        verify(&self.alpha, &self.anchor, &records)
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    /// Read-only handle for observers.
    pub fn reader(self: &Arc<Self>) -> AuditReader {
        AuditReader::new(Arc::clone(self))
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<AuditRecord> {
        // Records are only ever pushed whole, so a poisoned lock still guards
        // a consistent prefix.
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn verify(
    alpha: &AuthorityId,
    anchor: &VerifyingKey,
    records: &[AuditRecord],
) -> Result<(), AuditError> {
    let mut prev_hash = GENESIS_HASH.to_string();
    for (index, record) in records.iter().enumerate() {
        let expected = index as u64 + 1;
        if record.sequence != expected {
            return Err(AuditError::SequenceGap {
                expected,
                found: record.sequence,
            });
        }
        if record.prev_hash != prev_hash || record.expected_hash()? != record.record_hash {
            return Err(AuditError::ChainBroken {
                sequence: record.sequence,
            });
        }
        if let Some(decision) = record.entry.decision() {
            if decision.sequence() != record.sequence {
                return Err(AuditError::ChainBroken {
                    sequence: record.sequence,
                });
            }
            if decision.issuer() != alpha {
                return Err(AuditError::IssuerNotAlpha {
                    issuer: decision.issuer().clone(),
                    scope: decision.scope().clone(),
                });
            }
            verify_decision(decision, anchor).map_err(|reason| AuditError::ForgedDecision {
                sequence: record.sequence,
                reason,
            })?;
        }
        prev_hash = record.record_hash.clone();
    }
    Ok(())
}
