//! Audit trace.
//!
//! An append-only, hash-chained record of every intermediate artifact of a
//! decision cycle: rejections, proposals, breaches and decisions. The
//! interface has no update or delete operation. Each record links to its
//! predecessor through a BLAKE3 hash, so an exported stream that was edited,
//! reordered or truncated in the middle fails [`AuditTrace::replay`].
//!
//! Decisions enter the trace only through [`AuditTrace::append_decision`],
//! which seals Alpha's ruling with the record's own sequence number. Each
//! ruling must carry Alpha's Ed25519 signature; the trace holds Alpha's
//! verifying key and checks it on append and again on replay.
//!
//! Invalidated delegated attempts go to a separate [`DiagnosticLog`] and
//! never appear in decision history.

#![deny(unsafe_code)]

pub mod diagnostics;
pub mod error;
pub mod reader;
pub mod record;
pub mod signing;
pub mod trace;

pub use diagnostics::{AttemptKind, DiagnosticLog, InvalidatedAttempt};
pub use error::AuditError;
pub use reader::AuditReader;
pub use record::{AuditEntry, AuditRecord, GENESIS_HASH};
pub use signing::{key_fingerprint, sign_ruling, signing_key_from_hex, verify_decision, verify_ruling};
pub use trace::AuditTrace;
