use sovereign_types::{AuthorityId, CanonicalKey, GovernanceError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuditError {
    #[error("decision for {scope} issued by {issuer}, not Alpha")]
    IssuerNotAlpha {
        issuer: AuthorityId,
        scope: CanonicalKey,
    },

    #[error("decision for {scope} refused: {reason}")]
    UnsignedDecision { scope: CanonicalKey, reason: String },

    #[error("decision at audit sequence {sequence} fails signature check: {reason}")]
    ForgedDecision { sequence: u64, reason: String },

    #[error("audit sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    #[error("audit hash chain broken at sequence {sequence}")]
    ChainBroken { sequence: u64 },

    #[error("audit record serialization failed: {0}")]
    Serialization(String),

    #[error("audit trace lock poisoned")]
    LockPoisoned,
}

impl From<AuditError> for GovernanceError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::IssuerNotAlpha { issuer, scope } => GovernanceError::ConflictingAuthority {
                scope,
                detail: format!("binding decision issued by {issuer}"),
            },
            AuditError::UnsignedDecision { scope, reason } => {
                GovernanceError::ConflictingAuthority {
                    scope,
                    detail: format!("binding decision without valid Alpha signature: {reason}"),
                }
            }
            AuditError::ForgedDecision { sequence, .. } => {
                GovernanceError::RetroactiveMutation { sequence }
            }
            AuditError::SequenceGap { found, .. } => {
                GovernanceError::RetroactiveMutation { sequence: found }
            }
            AuditError::ChainBroken { sequence } => GovernanceError::RetroactiveMutation { sequence },
            other => GovernanceError::Halted(other.to_string()),
        }
    }
}
