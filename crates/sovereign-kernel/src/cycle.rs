use serde::{Deserialize, Serialize};
use sovereign_gate::GatedKey;
use sovereign_guardian::RiskState;
use sovereign_types::{
    ActionDescriptor, AuthorityId, Decision, DecisionAction, GovernanceError, GovernanceResult,
    GrantId, PredicateFiring, RawSignal, Ruling,
};
use uuid::Uuid;

/// Everything one decision cycle consumes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CycleInput {
    /// External identifier of the cycle's scope.
    pub identifier: String,
    /// Raw signals for the scope, in any order.
    #[serde(default)]
    pub window: Vec<RawSignal>,
    /// Auxiliary inputs the decision depends on, such as a benchmark.
    #[serde(default)]
    pub required: Vec<RawSignal>,
    #[serde(default)]
    pub risk: RiskState,
    #[serde(default)]
    pub delegated: Vec<DelegatedSubmission>,
}

impl CycleInput {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_signal(mut self, signal: RawSignal) -> Self {
        self.window.push(signal);
        self
    }

    pub fn requiring(mut self, signal: RawSignal) -> Self {
        self.required.push(signal);
        self
    }

    pub fn with_risk(mut self, risk: RiskState) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_submission(mut self, submission: DelegatedSubmission) -> Self {
        self.delegated.push(submission);
        self
    }
}

/// An action a delegated holder submits into a cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelegatedSubmission {
    pub holder: AuthorityId,
    pub grant: GrantId,
    pub action: DelegatedAction,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DelegatedAction {
    /// An advisory routing proposal. Audited when the grant covers
    /// `routing`, never binding.
    Proposal {
        regime: String,
        action: ActionDescriptor,
    },
    /// Additional breach firings. Merged into the Guardian verdict when the
    /// grant covers `risk-eval`.
    Breach { firings: Vec<PredicateFiring> },
    /// A direct binding decision. Always invalid.
    Binding { action: DecisionAction },
}

impl DelegatedSubmission {
    pub fn proposal(
        holder: AuthorityId,
        grant: GrantId,
        regime: impl Into<String>,
        action: ActionDescriptor,
    ) -> Self {
        Self {
            holder,
            grant,
            action: DelegatedAction::Proposal {
                regime: regime.into(),
                action,
            },
        }
    }

    pub fn breach(holder: AuthorityId, grant: GrantId, firings: Vec<PredicateFiring>) -> Self {
        Self {
            holder,
            grant,
            action: DelegatedAction::Breach { firings },
        }
    }

    pub fn binding(holder: AuthorityId, grant: GrantId, action: DecisionAction) -> Self {
        Self {
            holder,
            grant,
            action: DelegatedAction::Binding { action },
        }
    }
}

/// How a cycle ended.
#[derive(Clone, Debug, PartialEq)]
pub enum CycleOutcome {
    /// Alpha's decision was appended. `invalidated` lists delegated
    /// submissions that were discarded along the way.
    Decided {
        decision: Decision,
        invalidated: Vec<GovernanceError>,
    },
    /// The scope's own input was refused at the gate; no decision exists.
    Rejected { error: GovernanceError },
}

impl CycleOutcome {
    pub fn decision(&self) -> Option<&Decision> {
        match self {
            CycleOutcome::Decided { decision, .. } => Some(decision),
            CycleOutcome::Rejected { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<&GovernanceError> {
        match self {
            CycleOutcome::Rejected { error } => Some(error),
            CycleOutcome::Decided { .. } => None,
        }
    }
}

/// One decision cycle for one canonical scope.
///
/// Holds the single binding slot of the cycle: the first ruling bound is the
/// cycle's decision, and any further attempt, or a ruling from anyone but
/// Alpha, is `ConflictingAuthority`.
#[derive(Debug)]
pub struct DecisionCycle {
    id: Uuid,
    scope: GatedKey,
    alpha: AuthorityId,
    bound: Option<AuthorityId>,
}

impl DecisionCycle {
    pub fn new(scope: GatedKey, alpha: AuthorityId) -> Self {
        Self {
            id: Uuid::new_v4(),
            scope,
            alpha,
            bound: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn scope(&self) -> &GatedKey {
        &self.scope
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Claim the binding slot for `ruling`.
    pub fn bind(&mut self, ruling: Ruling) -> GovernanceResult<Ruling> {
        let conflict = |detail: String| GovernanceError::ConflictingAuthority {
            scope: self.scope.key().clone(),
            detail,
        };

        if let Some(previous) = &self.bound {
            return Err(conflict(format!(
                "{} attempted a second binding after {previous}",
                ruling.issuer()
            )));
        }
        if *ruling.issuer() != self.alpha {
            return Err(conflict(format!(
                "{} is not the sovereign authority {}",
                ruling.issuer(),
                self.alpha
            )));
        }
        if ruling.scope() != self.scope.key() {
            return Err(conflict(format!(
                "ruling for {} bound in cycle for {}",
                ruling.scope(),
                self.scope
            )));
        }

        self.bound = Some(ruling.issuer().clone());
        Ok(ruling)
    }
}
