use sovereign_types::{AuthorityId, GrantId, Phase};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DelegationError {
    #[error("Alpha authority cannot be a delegation holder")]
    AlphaHolder,

    #[error("phase {0} is not delegable")]
    NonDelegablePhase(Phase),

    #[error("grant scope names no phase")]
    EmptyScope,

    #[error("grant not found: {0}")]
    NotFound(GrantId),

    #[error("{0} is not permitted to revoke grants")]
    RevocationNotPermitted(AuthorityId),

    #[error("grant {0} is already revoked")]
    AlreadyRevoked(GrantId),

    #[error("delegation ledger lock poisoned")]
    LockPoisoned,
}
