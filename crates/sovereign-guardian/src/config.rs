use serde::{Deserialize, Serialize};
use sovereign_types::EnforcementAction;

/// Fires when drawdown exceeds `max_drawdown`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LossRule {
    pub max_drawdown: f64,
    pub action: EnforcementAction,
}

impl Default for LossRule {
    fn default() -> Self {
        Self {
            max_drawdown: 0.2,
            action: EnforcementAction::Unwind,
        }
    }
}

/// Fires when current exposure, or the allocation a proposal targets,
/// exceeds `max_exposure`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExposureRule {
    pub max_exposure: f64,
    pub action: EnforcementAction,
}

impl Default for ExposureRule {
    fn default() -> Self {
        Self {
            max_exposure: 1.0,
            action: EnforcementAction::Deny,
        }
    }
}

/// Fires when any hard-constraint flag is raised.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstraintRule {
    pub action: EnforcementAction,
}

impl Default for ConstraintRule {
    fn default() -> Self {
        Self {
            action: EnforcementAction::Freeze,
        }
    }
}

/// Fires on a large move into a market too rigid to absorb it:
/// `|price_span| >= crash_span` while `elasticity <= elasticity_floor`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShockRule {
    pub crash_span: f64,
    pub elasticity_floor: f64,
    pub action: EnforcementAction,
}

impl Default for ShockRule {
    fn default() -> Self {
        Self {
            crash_span: 0.25,
            elasticity_floor: 0.25,
            action: EnforcementAction::Freeze,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardianConfig {
    #[serde(default)]
    pub loss: LossRule,
    #[serde(default)]
    pub exposure: ExposureRule,
    #[serde(default)]
    pub constraints: ConstraintRule,
    #[serde(default)]
    pub shock: ShockRule,
}
