//! Regime router.
//!
//! Scores a normalized signal window, maps the score to a [`RegimeBand`] and
//! proposes the band's configured action. The proposal is advisory; the
//! router holds no authority and never reads the audit trace.
//!
//! [`RegimeBand`]: sovereign_types::RegimeBand

pub mod config;
pub mod error;
pub mod router;

pub use config::{BandPolicy, RouterConfig};
pub use error::RouterError;
pub use router::RegimeRouter;
