//! Sovereign kernel.
//!
//! Wires the governance pipeline together and hosts the only component
//! allowed to bind: the Alpha [`AuthorityResolver`].
//!
//! ```text
//! input -> Canonicalizer -> Normalizer -> RegimeRouter -> Guardian
//!       -> AuthorityResolver (ledger checks, conflict resolution)
//!       -> AuditTrace (sealed Decision)
//! ```
//!
//! Cycles for one canonical scope run strictly in that order and never
//! overlap; cycles for distinct scopes may run in parallel. The delegation
//! ledger and the audit trace are the only state shared across scopes.

pub mod config;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod ingress;
pub mod resolver;
pub mod telemetry;

pub use config::{DelegationSpec, GovernanceConfig, LogConfig};
pub use cycle::{CycleInput, CycleOutcome, DecisionCycle, DelegatedAction, DelegatedSubmission};
pub use engine::DecisionEngine;
pub use error::ConfigError;
pub use ingress::{Ingress, TablePublisher};
pub use resolver::{AlphaResolver, AuthorityResolver, ResolutionInput};
pub use telemetry::init_tracing;
