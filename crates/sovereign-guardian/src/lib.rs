//! Guardian.
//!
//! Evaluates a fixed, ordered set of boundary predicates against the current
//! [`RiskState`] and a routing proposal. Any firing produces a breach whose
//! enforcement action overrides the proposal at resolution time. The
//! Guardian only reports; it never executes enforcement.

pub mod config;
pub mod error;
pub mod guardian;
pub mod state;

pub use config::{
    ConstraintRule, ExposureRule, GuardianConfig, LossRule, ShockRule,
};
pub use error::GuardianError;
pub use guardian::Guardian;
pub use state::RiskState;
