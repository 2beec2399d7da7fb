//! Delegation ledger.
//!
//! Tracks every non-Alpha authority grant: its holder, scope, condition and
//! revocation state. Validity is computed at the moment of use from the
//! grant and the caller's [`DelegationContext`]; nothing is cached between
//! cycles. A revoked grant stays inert forever.
//!
//! Only Alpha may revoke, no grant may name Alpha as holder, and the
//! resolution phase can never be granted.
//!
//! [`DelegationContext`]: sovereign_types::DelegationContext

#![deny(unsafe_code)]

pub mod error;
pub mod grant;
pub mod ledger;

pub use error::DelegationError;
pub use grant::{AuthorityGrant, Revocation};
pub use ledger::DelegationLedger;
