use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::CanonicalKey;
use crate::regime::RegimeBand;

/// Identifier of an authority holder (Alpha or a delegate).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorityId(String);

impl AuthorityId {
    /// Default identifier of the sovereign authority.
    pub const ALPHA: &'static str = "ALPHA";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn alpha() -> Self {
        Self::new(Self::ALPHA)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AuthorityId {
    fn default() -> Self {
        Self::alpha()
    }
}

impl fmt::Display for AuthorityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a delegation grant, assigned by the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantId(pub u64);

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grant-{}", self.0)
    }
}

/// Pipeline phases a grant can cover.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Canonicalization,
    Normalization,
    Routing,
    RiskEval,
    /// Final routing, regime confirmation, revocation and override.
    /// Never delegable.
    Resolution,
}

impl Phase {
    pub fn is_delegable(self) -> bool {
        !matches!(self, Phase::Resolution)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Canonicalization => "canonicalization",
            Phase::Normalization => "normalization",
            Phase::Routing => "routing",
            Phase::RiskEval => "risk-eval",
            Phase::Resolution => "resolution",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which phases (and optionally which identity scopes) a grant applies to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantScope {
    pub phases: BTreeSet<Phase>,
    /// `None` covers every canonical scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<BTreeSet<CanonicalKey>>,
}

impl GrantScope {
    pub fn phase(phase: Phase) -> Self {
        Self {
            phases: BTreeSet::from([phase]),
            keys: None,
        }
    }

    pub fn phases(phases: impl IntoIterator<Item = Phase>) -> Self {
        Self {
            phases: phases.into_iter().collect(),
            keys: None,
        }
    }

    pub fn restricted_to(mut self, keys: impl IntoIterator<Item = CanonicalKey>) -> Self {
        self.keys = Some(keys.into_iter().collect());
        self
    }

    /// First phase in this scope that may never be delegated, if any.
    pub fn non_delegable_phase(&self) -> Option<Phase> {
        self.phases.iter().copied().find(|p| !p.is_delegable())
    }

    pub fn covers(&self, ctx: &DelegationContext) -> bool {
        if !self.phases.contains(&ctx.phase) {
            return false;
        }
        match &self.keys {
            Some(keys) => keys.contains(&ctx.scope),
            None => true,
        }
    }
}

/// Condition re-evaluated every time a grant is used.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GrantCondition {
    #[default]
    Always,
    /// Holds while the cycle's regime band is at most `band`.
    /// Fails closed when the band is not yet known.
    MaxBand { band: RegimeBand },
    /// Holds up to and including `at`.
    NotAfter { at: DateTime<Utc> },
    AllOf { conditions: Vec<GrantCondition> },
}

impl GrantCondition {
    pub fn holds(&self, ctx: &DelegationContext) -> bool {
        match self {
            GrantCondition::Always => true,
            GrantCondition::MaxBand { band } => ctx.band.is_some_and(|b| b <= *band),
            GrantCondition::NotAfter { at } => ctx.at <= *at,
            GrantCondition::AllOf { conditions } => conditions.iter().all(|c| c.holds(ctx)),
        }
    }
}

/// The moment-of-use context a grant is checked against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationContext {
    pub phase: Phase,
    pub scope: CanonicalKey,
    #[serde(default)]
    pub band: Option<RegimeBand>,
    pub at: DateTime<Utc>,
}

impl DelegationContext {
    pub fn new(phase: Phase, scope: CanonicalKey, at: DateTime<Utc>) -> Self {
        Self {
            phase,
            scope,
            band: None,
            at,
        }
    }

    pub fn with_band(mut self, band: RegimeBand) -> Self {
        self.band = Some(band);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ctx(phase: Phase) -> DelegationContext {
        DelegationContext::new(phase, CanonicalKey::new("SP500"), Utc::now())
    }

    #[test]
    fn resolution_is_not_delegable() {
        assert!(!Phase::Resolution.is_delegable());
        assert!(Phase::RiskEval.is_delegable());
        let scope = GrantScope::phases([Phase::Routing, Phase::Resolution]);
        assert_eq!(scope.non_delegable_phase(), Some(Phase::Resolution));
    }

    #[test]
    fn phase_parses_kebab_case() {
        let phase: Phase = serde_json::from_str("\"risk-eval\"").unwrap();
        assert_eq!(phase, Phase::RiskEval);
    }

    #[test]
    fn scope_checks_phase_and_keys() {
        let scope = GrantScope::phase(Phase::RiskEval);
        assert!(scope.covers(&ctx(Phase::RiskEval)));
        assert!(!scope.covers(&ctx(Phase::Routing)));

        let narrowed = scope.restricted_to([CanonicalKey::new("NDX")]);
        assert!(!narrowed.covers(&ctx(Phase::RiskEval)));
    }

    #[test]
    fn max_band_fails_closed_without_band() {
        let cond = GrantCondition::MaxBand {
            band: RegimeBand::Tense,
        };
        assert!(!cond.holds(&ctx(Phase::Routing)));
        assert!(cond.holds(&ctx(Phase::Routing).with_band(RegimeBand::Calm)));
        assert!(!cond.holds(&ctx(Phase::Routing).with_band(RegimeBand::Critical)));
    }

    #[test]
    fn all_of_requires_every_condition() {
        let past = Utc::now() - Duration::hours(1);
        let cond = GrantCondition::AllOf {
            conditions: vec![GrantCondition::Always, GrantCondition::NotAfter { at: past }],
        };
        assert!(!cond.holds(&ctx(Phase::Routing)));
    }
}
