use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Current risk state the Guardian evaluates against.
///
/// Owned by the caller; the Guardian only reads it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// Peak-to-current loss as a fraction, `0.0` when flat.
    #[serde(default)]
    pub drawdown: f64,
    /// Gross exposure as a fraction of capacity.
    #[serde(default)]
    pub exposure: f64,
    /// Names of hard constraints currently violated.
    #[serde(default)]
    pub constraint_flags: BTreeSet<String>,
    /// Signed price move relative to the prior state.
    #[serde(default)]
    pub price_span: f64,
    /// How much movement the market can absorb; higher is more resilient.
    #[serde(default = "resilient")]
    pub elasticity: f64,
}

fn resilient() -> f64 {
    1.0
}

impl Default for RiskState {
    fn default() -> Self {
        Self {
            drawdown: 0.0,
            exposure: 0.0,
            constraint_flags: BTreeSet::new(),
            price_span: 0.0,
            elasticity: resilient(),
        }
    }
}

impl RiskState {
    pub fn with_drawdown(mut self, drawdown: f64) -> Self {
        self.drawdown = drawdown;
        self
    }

    pub fn with_exposure(mut self, exposure: f64) -> Self {
        self.exposure = exposure;
        self
    }

    pub fn with_constraint(mut self, flag: impl Into<String>) -> Self {
        self.constraint_flags.insert(flag.into());
        self
    }

    pub fn with_shock(mut self, price_span: f64, elasticity: f64) -> Self {
        self.price_span = price_span;
        self.elasticity = elasticity;
        self
    }
}
