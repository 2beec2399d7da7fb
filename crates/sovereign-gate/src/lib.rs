//! Canonicalization and normalization gate.
//!
//! Every input crosses this gate before any other component sees it:
//!
//! 1. [`Canonicalizer::resolve`] maps an external identifier to a
//!    [`GatedKey`], or rejects it with `UnknownIdentifier`.
//! 2. [`Normalizer::normalize`] turns a raw signal into a bounded [`Signal`]
//!    for a `GatedKey`, or rejects it with `OutOfDomain`.
//!
//! `GatedKey`, `Signal` and `SignalWindow` can only be built inside this
//! crate, so downstream code that takes them cannot be handed an identity or
//! value that skipped the gate.

pub mod canonicalizer;
pub mod error;
pub mod normalizer;
pub mod signal;

pub use canonicalizer::{Canonicalizer, GatedKey};
pub use error::GateError;
pub use normalizer::{field_key, FieldBounds, Normalizer, NormalizerConfig, OnViolation};
pub use signal::{Signal, SignalWindow};
