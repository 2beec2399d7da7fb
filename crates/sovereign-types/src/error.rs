use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::authority::AuthorityId;
use crate::identity::CanonicalKey;

/// How a signal field left its configured domain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DomainViolation {
    BelowFloor { value: f64, floor: f64 },
    AboveCeiling { value: f64, ceiling: f64 },
    NotFinite,
    /// A configured field is absent from the raw signal.
    Missing,
    /// The raw signal carries a field with no configured bounds.
    Unconfigured,
    /// The raw signal spells the same field twice, differing only in case.
    DuplicateField,
    /// A windowed signal resolves to a scope other than the cycle's.
    ForeignScope { scope: String },
}

impl fmt::Display for DomainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainViolation::BelowFloor { value, floor } => {
                write!(f, "{value} below hard floor {floor}")
            }
            DomainViolation::AboveCeiling { value, ceiling } => {
                write!(f, "{value} above hard ceiling {ceiling}")
            }
            DomainViolation::NotFinite => f.write_str("value is not finite"),
            DomainViolation::Missing => f.write_str("required field missing"),
            DomainViolation::Unconfigured => f.write_str("field has no configured bounds"),
            DomainViolation::DuplicateField => f.write_str("field given more than once"),
            DomainViolation::ForeignScope { scope } => write!(f, "signal belongs to scope {scope}"),
        }
    }
}

/// Error taxonomy of the governance core.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GovernanceError {
    /// Canonicalization miss. Hard reject; nothing downstream runs.
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    /// Normalization bound violation. Hard reject.
    #[error("field {field} out of domain: {violation}")]
    OutOfDomain {
        field: String,
        violation: DomainViolation,
    },

    /// Scope, condition or revocation failure of a delegated action.
    /// The action is treated as never having occurred.
    #[error("invalid delegation by {holder}: {reason}")]
    InvalidDelegation { holder: AuthorityId, reason: String },

    /// More than one binding emission in one cycle.
    #[error("conflicting authority in scope {scope}: {detail}")]
    ConflictingAuthority { scope: CanonicalKey, detail: String },

    /// An already-appended record no longer matches its hash chain.
    #[error("retroactive mutation detected at audit sequence {sequence}")]
    RetroactiveMutation { sequence: u64 },

    #[error("governance core halted: {0}")]
    Halted(String),
}

impl GovernanceError {
    /// Fatal errors stop all further processing.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GovernanceError::ConflictingAuthority { .. }
                | GovernanceError::RetroactiveMutation { .. }
                | GovernanceError::Halted(_)
        )
    }

    /// Rejections that abort only the affected cycle.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            GovernanceError::UnknownIdentifier(_) | GovernanceError::OutOfDomain { .. }
        )
    }

    /// Stable short code used in audit records and logs.
    pub fn code(&self) -> &'static str {
        match self {
            GovernanceError::UnknownIdentifier(_) => "UNKNOWN_IDENTIFIER",
            GovernanceError::OutOfDomain { .. } => "OUT_OF_DOMAIN",
            GovernanceError::InvalidDelegation { .. } => "INVALID_DELEGATION",
            GovernanceError::ConflictingAuthority { .. } => "CONFLICTING_AUTHORITY",
            GovernanceError::RetroactiveMutation { .. } => "RETROACTIVE_MUTATION",
            GovernanceError::Halted(_) => "HALTED",
        }
    }
}

pub type GovernanceResult<T> = Result<T, GovernanceError>;
