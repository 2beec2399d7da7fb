use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sovereign_types::{ActionDescriptor, RegimeBand};

/// The proposal attached to one regime band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BandPolicy {
    pub band: RegimeBand,
    pub regime: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_allocation: Option<f64>,
}

impl BandPolicy {
    pub fn new(band: RegimeBand, regime: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            band,
            regime: regime.into(),
            action: action.into(),
            target_allocation: None,
        }
    }

    pub fn with_target(mut self, allocation: f64) -> Self {
        self.target_allocation = Some(allocation);
        self
    }

    pub fn descriptor(&self) -> ActionDescriptor {
        let descriptor = ActionDescriptor::new(self.action.clone());
        match self.target_allocation {
            Some(target) => descriptor.with_target(target),
            None => descriptor,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Stress weight per normalized field. Fields without a weight are ignored.
    pub weights: BTreeMap<String, f64>,
    /// Upper score bounds of calm, tense and fragile.
    pub thresholds: [f64; 3],
    pub band_policies: Vec<BandPolicy>,
    /// Only the most recent `max_window` signals are scored.
    pub max_window: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::from([
                ("volatility".to_string(), 1.0),
                ("liquidity".to_string(), 1.4),
                ("flow".to_string(), 1.2),
                ("tail_risk".to_string(), 1.6),
                ("stress".to_string(), 2.0),
            ]),
            thresholds: [1.2, 2.5, 4.0],
            band_policies: vec![
                BandPolicy::new(RegimeBand::Calm, "risk-on", "increase").with_target(1.0),
                BandPolicy::new(RegimeBand::Tense, "neutral", "hold").with_target(0.6),
                BandPolicy::new(RegimeBand::Fragile, "risk-off", "reduce").with_target(0.3),
                BandPolicy::new(RegimeBand::Critical, "risk-off", "exit").with_target(0.0),
            ],
            max_window: 64,
        }
    }
}
