use sovereign_types::PredicateKind;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardianError {
    #[error("invalid threshold for {predicate}: {reason}")]
    InvalidThreshold {
        predicate: PredicateKind,
        reason: String,
    },
}
