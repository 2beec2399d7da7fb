use thiserror::Error;

/// Configuration errors raised while building the gate.
///
/// These are load-time failures; per-input rejections use
/// `GovernanceError` instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GateError {
    #[error("alias {alias} maps to both {existing} and {conflicting}")]
    AliasConflict {
        alias: String,
        existing: String,
        conflicting: String,
    },

    #[error("identity table contains an empty identifier")]
    EmptyIdentifier,

    #[error("invalid bounds for field {field}: {reason}")]
    InvalidBounds { field: String, reason: String },
}
