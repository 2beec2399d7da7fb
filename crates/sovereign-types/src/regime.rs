use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authority::{AuthorityId, GrantId};
use crate::identity::CanonicalKey;

/// Coarse market regime, ordered from calm to critical.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegimeBand {
    Calm,
    Tense,
    Fragile,
    Critical,
}

impl RegimeBand {
    pub const ALL: [RegimeBand; 4] = [
        RegimeBand::Calm,
        RegimeBand::Tense,
        RegimeBand::Fragile,
        RegimeBand::Critical,
    ];

    pub fn index(self) -> usize {
        match self {
            RegimeBand::Calm => 0,
            RegimeBand::Tense => 1,
            RegimeBand::Fragile => 2,
            RegimeBand::Critical => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RegimeBand::Calm => "calm",
            RegimeBand::Tense => "tense",
            RegimeBand::Fragile => "fragile",
            RegimeBand::Critical => "critical",
        }
    }
}

impl fmt::Display for RegimeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a proposal asks for: an action kind and an optional target allocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_allocation: Option<f64>,
}

impl ActionDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target_allocation: None,
        }
    }

    pub fn with_target(mut self, allocation: f64) -> Self {
        self.target_allocation = Some(allocation);
        self
    }
}

/// Who produced a proposal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Proposer {
    /// The in-pipeline regime router.
    Router,
    /// A delegated holder acting under a grant.
    Delegate { holder: AuthorityId, grant: GrantId },
}

fn always_advisory() -> bool {
    true
}

/// Regime-conditioned routing proposal.
///
/// Produced once per decision cycle and never mutated afterwards. A proposal
/// is advisory by construction: it has no effect until Alpha ratifies it, and
/// the advisory flag cannot be cleared, not even through deserialisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingProposal {
    scope: CanonicalKey,
    regime: String,
    band: RegimeBand,
    score: f64,
    confidence: f64,
    action: ActionDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    observed_through: Option<DateTime<Utc>>,
    proposer: Proposer,
    #[serde(skip_deserializing, default = "always_advisory")]
    advisory: bool,
}

impl RoutingProposal {
    pub fn new(
        scope: CanonicalKey,
        band: RegimeBand,
        regime: impl Into<String>,
        action: ActionDescriptor,
    ) -> Self {
        Self {
            scope,
            regime: regime.into(),
            band,
            score: 0.0,
            confidence: 0.0,
            action,
            observed_through: None,
            proposer: Proposer::Router,
            advisory: true,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn observed_through(mut self, at: DateTime<Utc>) -> Self {
        self.observed_through = Some(at);
        self
    }

    pub fn proposed_by(mut self, proposer: Proposer) -> Self {
        self.proposer = proposer;
        self
    }

    pub fn scope(&self) -> &CanonicalKey {
        &self.scope
    }

    pub fn regime(&self) -> &str {
        &self.regime
    }

    pub fn band(&self) -> RegimeBand {
        self.band
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn action(&self) -> &ActionDescriptor {
        &self.action
    }

    pub fn observed_at(&self) -> Option<DateTime<Utc>> {
        self.observed_through
    }

    pub fn proposer(&self) -> &Proposer {
        &self.proposer
    }

    pub fn is_advisory(&self) -> bool {
        self.advisory
    }

    pub fn is_delegated(&self) -> bool {
        matches!(self.proposer, Proposer::Delegate { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proposal() -> RoutingProposal {
        RoutingProposal::new(
            CanonicalKey::new("SP500"),
            RegimeBand::Fragile,
            "risk-off",
            ActionDescriptor::new("reduce").with_target(0.3),
        )
    }

    #[test]
    fn bands_are_ordered_calm_to_critical() {
        assert!(RegimeBand::Calm < RegimeBand::Tense);
        assert!(RegimeBand::Fragile < RegimeBand::Critical);
        assert_eq!(RegimeBand::ALL.iter().map(|b| b.index()).sum::<usize>(), 6);
    }

    #[test]
    fn proposals_are_always_advisory() {
        assert!(proposal().is_advisory());
    }

    #[test]
    fn advisory_flag_survives_hostile_deserialisation() {
        let mut json = serde_json::to_value(proposal()).unwrap();
        json["advisory"] = serde_json::Value::Bool(false);
        let back: RoutingProposal = serde_json::from_value(json).unwrap();
        assert!(back.is_advisory());
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(proposal().with_confidence(1.7).confidence(), 1.0);
        assert_eq!(proposal().with_confidence(-0.2).confidence(), 0.0);
    }
}
