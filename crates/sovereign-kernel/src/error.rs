use sovereign_delegation::DelegationError;
use sovereign_gate::GateError;
use sovereign_guardian::GuardianError;
use sovereign_router::RouterError;
use thiserror::Error;

/// Errors raised while loading or applying a governance configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration load failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("identity table or bounds invalid: {0}")]
    Gate(#[from] GateError),

    #[error("router configuration invalid: {0}")]
    Router(#[from] RouterError),

    #[error("guardian configuration invalid: {0}")]
    Guardian(#[from] GuardianError),

    #[error("delegation {index} invalid: {source}")]
    Delegation {
        index: usize,
        #[source]
        source: DelegationError,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
