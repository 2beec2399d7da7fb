use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of enforcement actions a breach can force.
///
/// Ordered by precedence when several predicates fire at once:
/// `Freeze` > `Unwind` > `Deny`. Freeze wins because it commits to nothing
/// irreversible while the boundary signals disagree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementAction {
    Freeze,
    Unwind,
    Deny,
}

impl EnforcementAction {
    pub fn precedence(self) -> u8 {
        match self {
            EnforcementAction::Freeze => 3,
            EnforcementAction::Unwind => 2,
            EnforcementAction::Deny => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnforcementAction::Freeze => "freeze",
            EnforcementAction::Unwind => "unwind",
            EnforcementAction::Deny => "deny",
        }
    }
}

impl Ord for EnforcementAction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.precedence().cmp(&other.precedence())
    }
}

impl PartialOrd for EnforcementAction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for EnforcementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The boundary predicates the Guardian evaluates, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PredicateKind {
    LossThreshold,
    ExposureLimit,
    ConstraintViolation,
    ShockCrash,
}

impl PredicateKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PredicateKind::LossThreshold => "loss-threshold",
            PredicateKind::ExposureLimit => "exposure-limit",
            PredicateKind::ConstraintViolation => "constraint-violation",
            PredicateKind::ShockCrash => "shock-crash",
        }
    }
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One predicate that fired, with the observation that tripped it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredicateFiring {
    pub predicate: PredicateKind,
    pub action: EnforcementAction,
    pub observed: f64,
    pub limit: f64,
    #[serde(default)]
    pub detail: String,
}

impl PredicateFiring {
    pub fn new(
        predicate: PredicateKind,
        action: EnforcementAction,
        observed: f64,
        limit: f64,
    ) -> Self {
        Self {
            predicate,
            action,
            observed,
            limit,
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

/// Guardian override. When present it dominates any routing proposal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreachSignal {
    action: EnforcementAction,
    trigger: PredicateFiring,
    firings: Vec<PredicateFiring>,
}

impl BreachSignal {
    /// Resolve a set of firings into a breach.
    ///
    /// The action is the highest-precedence action among the firings; the
    /// trigger is the first firing (in the given order) carrying that action.
    /// Returns `None` when nothing fired.
    pub fn from_firings(firings: Vec<PredicateFiring>) -> Option<Self> {
        let action = firings.iter().map(|f| f.action).max()?;
        let trigger = firings.iter().find(|f| f.action == action)?.clone();
        Some(Self {
            action,
            trigger,
            firings,
        })
    }

    /// Combine two breaches; firings keep their order, `self` first.
    pub fn merge(self, other: BreachSignal) -> BreachSignal {
        let action = self.action.max(other.action);
        let trigger = if self.action >= other.action {
            self.trigger
        } else {
            other.trigger
        };
        let mut firings = self.firings;
        firings.extend(other.firings);
        Self {
            action,
            trigger,
            firings,
        }
    }

    pub fn action(&self) -> EnforcementAction {
        self.action
    }

    pub fn trigger(&self) -> &PredicateFiring {
        &self.trigger
    }

    pub fn firings(&self) -> &[PredicateFiring] {
        &self.firings
    }
}

/// Output of a Guardian evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "kebab-case")]
pub enum GuardianVerdict {
    PassThrough,
    Breach(BreachSignal),
}

impl GuardianVerdict {
    pub fn is_breach(&self) -> bool {
        matches!(self, GuardianVerdict::Breach(_))
    }

    pub fn breach(&self) -> Option<&BreachSignal> {
        match self {
            GuardianVerdict::Breach(b) => Some(b),
            GuardianVerdict::PassThrough => None,
        }
    }

    pub fn into_breach(self) -> Option<BreachSignal> {
        match self {
            GuardianVerdict::Breach(b) => Some(b),
            GuardianVerdict::PassThrough => None,
        }
    }
}
