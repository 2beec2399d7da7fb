use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::Utc;
use sovereign_types::{
    AuthorityId, DelegationContext, GovernanceError, GovernanceResult, GrantCondition, GrantId,
    GrantScope,
};
use tracing::{debug, info, warn};

use crate::error::DelegationError;
use crate::grant::{AuthorityGrant, Revocation};

#[derive(Default)]
struct LedgerState {
    grants: BTreeMap<GrantId, AuthorityGrant>,
    revocations: Vec<Revocation>,
    next_id: u64,
}

/// Registry of delegated authority.
///
/// Reads run concurrently; `grant` and `revoke` take the write lock and are
/// atomic with respect to each other.
pub struct DelegationLedger {
    alpha: AuthorityId,
    state: RwLock<LedgerState>,
}

impl DelegationLedger {
    pub fn new(alpha: AuthorityId) -> Self {
        Self {
            alpha,
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn alpha(&self) -> &AuthorityId {
        &self.alpha
    }

    /// Issue a new grant.
    pub fn grant(
        &self,
        holder: AuthorityId,
        scope: GrantScope,
        condition: GrantCondition,
    ) -> Result<GrantId, DelegationError> {
        if holder == self.alpha {
            return Err(DelegationError::AlphaHolder);
        }
        if scope.phases.is_empty() {
            return Err(DelegationError::EmptyScope);
        }
        if let Some(phase) = scope.non_delegable_phase() {
            return Err(DelegationError::NonDelegablePhase(phase));
        }

        let mut state = self.state.write().map_err(|_| DelegationError::LockPoisoned)?;
        state.next_id += 1;
        let id = GrantId(state.next_id);
        let phases: Vec<&str> = scope.phases.iter().map(|p| p.as_str()).collect();
        info!(grant = %id, holder = %holder, phases = ?phases, "Authority delegated");

        state
            .grants
            .insert(id, AuthorityGrant::new(id, holder, scope, condition, Utc::now()));
        Ok(id)
    }

    /// Revoke a grant. Only Alpha may revoke, and revocation is permanent.
    pub fn revoke(
        &self,
        id: GrantId,
        by: &AuthorityId,
        reason: impl Into<String>,
    ) -> Result<(), DelegationError> {
        if *by != self.alpha {
            return Err(DelegationError::RevocationNotPermitted(by.clone()));
        }

        let mut state = self.state.write().map_err(|_| DelegationError::LockPoisoned)?;
        let grant = state
            .grants
            .get_mut(&id)
            .ok_or(DelegationError::NotFound(id))?;
        if grant.is_revoked() {
            return Err(DelegationError::AlreadyRevoked(id));
        }

        let now = Utc::now();
        grant.mark_revoked(now);
        let revocation = Revocation {
            grant: id,
            holder: grant.holder().clone(),
            revoked_by: by.clone(),
            revoked_at: now,
            reason: reason.into(),
        };
        warn!(grant = %id, holder = %revocation.holder, reason = %revocation.reason, "Authority revoked");
        state.revocations.push(revocation);
        Ok(())
    }

    /// Whether the grant authorizes `ctx` right now.
    ///
    /// Unknown grants and a poisoned lock both answer `false`.
    pub fn is_valid(&self, id: GrantId, ctx: &DelegationContext) -> bool {
        match self.state.read() {
            Ok(state) => state.grants.get(&id).is_some_and(|g| g.is_valid(ctx)),
            Err(_) => false,
        }
    }

    /// Check that `holder` may act under grant `id` in `ctx`.
    ///
    /// Every failure is `InvalidDelegation`: the caller must discard the
    /// attempted action as if it never happened.
    pub fn authorize(
        &self,
        id: GrantId,
        holder: &AuthorityId,
        ctx: &DelegationContext,
    ) -> GovernanceResult<AuthorityGrant> {
        let invalid = |reason: String| {
            debug!(grant = %id, holder = %holder, reason = %reason, "Delegated action refused");
            GovernanceError::InvalidDelegation {
                holder: holder.clone(),
                reason,
            }
        };

        let state = self
            .state
            .read()
            .map_err(|_| invalid("delegation ledger unavailable".to_string()))?;
        let grant = state
            .grants
            .get(&id)
            .ok_or_else(|| invalid(format!("{id} does not exist")))?;
        if grant.holder() != holder {
            return Err(invalid(format!("{id} is not held by {holder}")));
        }
        match grant.invalidity(ctx) {
            Some(reason) => Err(invalid(reason)),
            None => Ok(grant.clone()),
        }
    }

    pub fn get(&self, id: GrantId) -> Option<AuthorityGrant> {
        self.state.read().ok()?.grants.get(&id).cloned()
    }

    /// All grants held by `holder`, revoked ones included.
    pub fn grants_for(&self, holder: &AuthorityId) -> Vec<AuthorityGrant> {
        match self.state.read() {
            Ok(state) => state
                .grants
                .values()
                .filter(|g| g.holder() == holder)
                .cloned()
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn revocations(&self) -> Vec<Revocation> {
        match self.state.read() {
            Ok(state) => state.revocations.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.grants.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sovereign_types::{CanonicalKey, Phase, RegimeBand};

    fn ledger() -> DelegationLedger {
        DelegationLedger::new(AuthorityId::alpha())
    }

    fn guardian() -> AuthorityId {
        AuthorityId::new("GUARDIAN")
    }

    fn ctx(phase: Phase) -> DelegationContext {
        DelegationContext::new(phase, CanonicalKey::new("SP500"), Utc::now())
    }

    #[test]
    fn grant_is_valid_inside_scope_only() {
        let ledger = ledger();
        let id = ledger
            .grant(guardian(), GrantScope::phase(Phase::RiskEval), GrantCondition::Always)
            .unwrap();

        assert!(ledger.is_valid(id, &ctx(Phase::RiskEval)));
        assert!(!ledger.is_valid(id, &ctx(Phase::Routing)));
        assert!(!ledger.is_valid(id, &ctx(Phase::Resolution)));
    }

    #[test]
    fn resolution_and_alpha_cannot_be_granted() {
        let ledger = ledger();
        assert_eq!(
            ledger
                .grant(guardian(), GrantScope::phase(Phase::Resolution), GrantCondition::Always)
                .unwrap_err(),
            DelegationError::NonDelegablePhase(Phase::Resolution)
        );
        assert_eq!(
            ledger
                .grant(AuthorityId::alpha(), GrantScope::phase(Phase::Routing), GrantCondition::Always)
                .unwrap_err(),
            DelegationError::AlphaHolder
        );
        assert_eq!(
            ledger
                .grant(guardian(), GrantScope::phases(Vec::<Phase>::new()), GrantCondition::Always)
                .unwrap_err(),
            DelegationError::EmptyScope
        );
        assert!(ledger.is_empty());
    }

    #[test]
    fn revocation_is_final() {
        let ledger = ledger();
        let id = ledger
            .grant(guardian(), GrantScope::phase(Phase::RiskEval), GrantCondition::Always)
            .unwrap();

        ledger.revoke(id, &AuthorityId::alpha(), "rotated").unwrap();
        assert!(!ledger.is_valid(id, &ctx(Phase::RiskEval)));
        assert_eq!(
            ledger.revoke(id, &AuthorityId::alpha(), "again").unwrap_err(),
            DelegationError::AlreadyRevoked(id)
        );
        assert!(ledger.get(id).unwrap().is_revoked());

        let history = ledger.revocations();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, "rotated");

        // A fresh grant is a different grant; the old one stays inert.
        let fresh = ledger
            .grant(guardian(), GrantScope::phase(Phase::RiskEval), GrantCondition::Always)
            .unwrap();
        assert_ne!(fresh, id);
        assert!(ledger.is_valid(fresh, &ctx(Phase::RiskEval)));
        assert!(!ledger.is_valid(id, &ctx(Phase::RiskEval)));
    }

    #[test]
    fn only_alpha_revokes() {
        let ledger = ledger();
        let id = ledger
            .grant(guardian(), GrantScope::phase(Phase::RiskEval), GrantCondition::Always)
            .unwrap();
        assert_eq!(
            ledger.revoke(id, &guardian(), "self-revoke").unwrap_err(),
            DelegationError::RevocationNotPermitted(guardian())
        );
        assert!(ledger.is_valid(id, &ctx(Phase::RiskEval)));
    }

    #[test]
    fn conditions_are_checked_at_use() {
        let ledger = ledger();
        let id = ledger
            .grant(
                AuthorityId::new("ADVISOR"),
                GrantScope::phase(Phase::Routing),
                GrantCondition::MaxBand {
                    band: RegimeBand::Tense,
                },
            )
            .unwrap();

        assert!(ledger.is_valid(id, &ctx(Phase::Routing).with_band(RegimeBand::Calm)));
        assert!(!ledger.is_valid(id, &ctx(Phase::Routing).with_band(RegimeBand::Fragile)));

        let expiring = ledger
            .grant(
                AuthorityId::new("ADVISOR"),
                GrantScope::phase(Phase::Routing),
                GrantCondition::NotAfter {
                    at: Utc::now() + Duration::minutes(5),
                },
            )
            .unwrap();
        let later = DelegationContext::new(
            Phase::Routing,
            CanonicalKey::new("SP500"),
            Utc::now() + Duration::hours(1),
        );
        assert!(ledger.is_valid(expiring, &ctx(Phase::Routing)));
        assert!(!ledger.is_valid(expiring, &later));
    }

    #[test]
    fn authorize_checks_holder() {
        let ledger = ledger();
        let id = ledger
            .grant(guardian(), GrantScope::phase(Phase::RiskEval), GrantCondition::Always)
            .unwrap();

        let grant = ledger.authorize(id, &guardian(), &ctx(Phase::RiskEval)).unwrap();
        assert_eq!(grant.holder(), &guardian());

        let err = ledger
            .authorize(id, &AuthorityId::new("ADVISOR"), &ctx(Phase::RiskEval))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidDelegation { .. }));

        let err = ledger
            .authorize(GrantId(99), &guardian(), &ctx(Phase::RiskEval))
            .unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidDelegation { .. }));
    }

    #[test]
    fn grants_serialise_for_reporting() {
        let ledger = ledger();
        let id = ledger
            .grant(
                guardian(),
                GrantScope::phase(Phase::RiskEval).restricted_to([CanonicalKey::new("SP500")]),
                GrantCondition::Always,
            )
            .unwrap();
        let json = serde_json::to_value(ledger.get(id).unwrap()).unwrap();
        assert_eq!(json["holder"], "GUARDIAN");
        assert_eq!(json["scope"]["phases"][0], "risk-eval");
        assert_eq!(ledger.grants_for(&guardian()).len(), 1);
    }
}
