use sovereign_types::RegimeBand;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouterError {
    #[error("weight for field {field} must be finite and non-negative")]
    InvalidWeight { field: String },

    #[error("weight for field {field} given twice ignoring case")]
    DuplicateWeight { field: String },

    #[error("band thresholds must be positive and strictly ascending: {0:?}")]
    InvalidThresholds([f64; 3]),

    #[error("no band policy configured for {0}")]
    MissingPolicy(RegimeBand),

    #[error("more than one band policy configured for {0}")]
    DuplicatePolicy(RegimeBand),

    #[error("max_window must be at least 1")]
    EmptyWindowLimit,
}
