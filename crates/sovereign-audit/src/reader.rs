use std::ops::RangeBounds;
use std::sync::Arc;

use sovereign_types::Decision;

use crate::diagnostics::InvalidatedAttempt;
use crate::error::AuditError;
use crate::record::AuditRecord;
use crate::trace::AuditTrace;

/// Read-only view of an audit trace for observers and reporting.
///
/// Holds no append capability, and nothing it returns is an input to
/// resolution.
#[derive(Clone, Debug)]
pub struct AuditReader {
    trace: Arc<AuditTrace>,
}

impl AuditReader {
    pub(crate) fn new(trace: Arc<AuditTrace>) -> Self {
        Self { trace }
    }

    pub fn read(&self, range: impl RangeBounds<u64>) -> Vec<AuditRecord> {
        self.trace.read(range)
    }

    pub fn decisions(&self) -> Vec<Decision> {
        self.trace.decisions()
    }

    pub fn diagnostics(&self) -> Vec<InvalidatedAttempt> {
        self.trace.diagnostics().entries()
    }

    pub fn verify_chain(&self) -> Result<(), AuditError> {
        self.trace.verify_chain()
    }

    pub fn len(&self) -> usize {
        self.trace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trace.is_empty()
    }
}
