//! # sovereign-types
//!
//! Shared value types for the Sovereign governance core.
//!
//! Every component of the decision pipeline speaks in these types:
//!
//! - **Identity**: `CanonicalKey`, `Identity` and the case-normalisation rule
//!   applied to every external identifier
//! - **Signals**: `RawSignal`, the untrusted input handed to the gate
//! - **Regime**: `RegimeBand`, `ActionDescriptor`, `RoutingProposal`
//!   (always advisory)
//! - **Enforcement**: `EnforcementAction`, `BreachSignal`, `GuardianVerdict`
//! - **Authority**: `AuthorityId`, `GrantId`, `Phase`, `GrantScope`,
//!   `GrantCondition`, `DelegationContext`
//! - **Decision**: `Ruling` (what Alpha resolved), `AlphaSignature` and
//!   `Decision` (the sealed, sequenced, binding artifact)
//!
//! ## Invariants carried by the types
//!
//! - A `RoutingProposal` is advisory by construction; there is no way to
//!   build a non-advisory one.
//! - `Phase::Resolution` is the non-delegable phase.
//! - A `Decision` only comes into existence by sealing a `Ruling` with a
//!   sequence number; it exposes no mutators.

pub mod authority;
pub mod decision;
pub mod enforcement;
pub mod error;
pub mod identity;
pub mod regime;
pub mod signal;

pub use authority::{
    AuthorityId, DelegationContext, GrantCondition, GrantId, GrantScope, Phase,
};
pub use decision::{
    AlphaSignature, Decision, DecisionAction, DecisionSource, DenyReason, Ruling,
};
pub use enforcement::{
    BreachSignal, EnforcementAction, GuardianVerdict, PredicateFiring, PredicateKind,
};
pub use error::{DomainViolation, GovernanceError, GovernanceResult};
pub use identity::{normalize_identifier, CanonicalKey, Identity};
pub use regime::{ActionDescriptor, Proposer, RegimeBand, RoutingProposal};
pub use signal::RawSignal;
