use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use ed25519_dalek::{SigningKey, VerifyingKey};
use sovereign_audit::{key_fingerprint, AttemptKind, AuditReader, AuditTrace};
use sovereign_delegation::DelegationLedger;
use sovereign_gate::{Canonicalizer, GatedKey, Normalizer, SignalWindow};
use sovereign_guardian::Guardian;
use sovereign_router::RegimeRouter;
use sovereign_types::{
    AuthorityId, BreachSignal, CanonicalKey, Decision, DecisionAction, DelegationContext,
    DomainViolation, GovernanceError, GovernanceResult, GrantId, Phase, PredicateFiring,
    Proposer, RawSignal, RegimeBand, RoutingProposal,
};
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::config::GovernanceConfig;
use crate::cycle::{CycleInput, CycleOutcome, DecisionCycle, DelegatedAction, DelegatedSubmission};
use crate::error::ConfigError;
use crate::ingress::Ingress;
use crate::resolver::{AlphaResolver, AuthorityResolver, ResolutionInput};

/// The governance pipeline.
///
/// Runs one decision cycle per input: canonicalize, normalize, route,
/// evaluate risk, resolve, append. Cycles for one scope are serialized by a
/// per-scope lock; the ledger and the audit trace are the only state shared
/// between scopes. A fatal error latches the engine halted.
pub struct DecisionEngine {
    alpha: AuthorityId,
    canonicalizer: Arc<Canonicalizer>,
    normalizer: Normalizer,
    router: RegimeRouter,
    guardian: Guardian,
    ledger: Arc<DelegationLedger>,
    audit: Arc<AuditTrace>,
    resolver: Arc<dyn AuthorityResolver>,
    scope_locks: DashMap<CanonicalKey, Arc<Mutex<()>>>,
    ingest_timeout: Duration,
    halted: AtomicBool,
}

impl std::fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("alpha", &self.alpha)
            .field("identities", &self.canonicalizer.len())
            .field("grants", &self.ledger.len())
            .field("records", &self.audit.len())
            .field("halted", &self.is_halted())
            .finish()
    }
}

impl DecisionEngine {
    /// Build every component from a validated configuration and issue the
    /// configured delegations.
    pub fn from_config(config: &GovernanceConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let canonicalizer = config.canonicalizer()?;
        let ledger = DelegationLedger::new(config.alpha.clone());
        for (index, spec) in config.delegations.iter().enumerate() {
            let scope = config.grant_scope(index, &canonicalizer)?;
            ledger
                .grant(spec.holder.clone(), scope, spec.condition.clone())
                .map_err(|source| ConfigError::Delegation { index, source })?;
        }

        let signing_key = match config.signing_key()? {
            Some(key) => key,
            None => {
                let key = SigningKey::from_bytes(&rand::random::<[u8; 32]>());
                warn!(
                    fingerprint = %key_fingerprint(&key.verifying_key()),
                    "No alpha_signing_key configured; using an ephemeral key for this run"
                );
                key
            }
        };
        let anchor = signing_key.verifying_key();

        info!(
            alpha = %config.alpha,
            anchor = %key_fingerprint(&anchor),
            identities = canonicalizer.len(),
            delegations = config.delegations.len(),
            "Decision engine configured"
        );

        Ok(Self {
            alpha: config.alpha.clone(),
            canonicalizer: Arc::new(canonicalizer),
            normalizer: config.normalizer()?,
            router: config.regime_router()?,
            guardian: config.guardian()?,
            ledger: Arc::new(ledger),
            audit: Arc::new(AuditTrace::new(config.alpha.clone(), anchor)),
            resolver: Arc::new(AlphaResolver::new(config.alpha.clone(), signing_key)),
            scope_locks: DashMap::new(),
            ingest_timeout: config.ingest_timeout(),
            halted: AtomicBool::new(false),
        })
    }

    /// Replace the resolver. The engine still refuses any ruling not issued
    /// by the configured Alpha and signed with its key.
    pub fn with_resolver(mut self, resolver: Arc<dyn AuthorityResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn alpha(&self) -> &AuthorityId {
        &self.alpha
    }

    /// Alpha's verifying key; replaying an export needs it.
    pub fn anchor(&self) -> &VerifyingKey {
        self.audit.anchor()
    }

    pub fn ledger(&self) -> &Arc<DelegationLedger> {
        &self.ledger
    }

    pub fn audit(&self) -> &Arc<AuditTrace> {
        &self.audit
    }

    pub fn reader(&self) -> AuditReader {
        self.audit.reader()
    }

    /// An ingress over this engine's own identity table.
    pub fn ingress(&self) -> Ingress {
        Ingress::ready(Arc::clone(&self.canonicalizer), self.ingest_timeout)
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Run one decision cycle to a decision or a rejection.
    ///
    /// `Ok(Rejected)` means the scope's own input was refused at the gate and
    /// a rejection record was appended. `Err` is reserved for fatal errors,
    /// after which the engine stays halted.
    pub fn run_cycle(&self, input: CycleInput) -> GovernanceResult<CycleOutcome> {
        self.ensure_running()?;

        let result = match self.canonicalizer.resolve(&input.identifier) {
            Ok(scope) => self.run_gated(scope, input),
            Err(err) => self.reject(Uuid::new_v4(), &input.identifier, None, err),
        };
        result.inspect_err(|err| self.halt_on(err))
    }

    /// Record an attempt by a delegated holder to bind a decision directly.
    ///
    /// Always refused: binding is never delegable. The attempt is written to
    /// the diagnostic log only, so decision history never sees it. An
    /// identifier that does not canonicalize is rejected like any other
    /// ungated input.
    pub fn submit_binding(
        &self,
        holder: AuthorityId,
        grant: GrantId,
        identifier: &str,
        action: DecisionAction,
    ) -> GovernanceResult<Decision> {
        self.ensure_running()?;
        let scope = match self.canonicalizer.resolve(identifier) {
            Ok(scope) => scope,
            Err(err) => {
                self.reject(Uuid::new_v4(), identifier, None, err.clone())
                    .inspect_err(|fatal| self.halt_on(fatal))?;
                return Err(err);
            }
        };
        let err = binding_refused(&holder, &action);
        self.audit.diagnostics().record(
            Uuid::new_v4(),
            holder,
            Some(grant),
            scope.into_key(),
            AttemptKind::Binding,
            err.to_string(),
        );
        Err(err)
    }

    /// Run cycles on blocking tasks. Results come back in input order.
    pub async fn run_concurrent(
        self: &Arc<Self>,
        inputs: Vec<CycleInput>,
    ) -> Vec<GovernanceResult<CycleOutcome>> {
        let mut results: Vec<Option<GovernanceResult<CycleOutcome>>> =
            (0..inputs.len()).map(|_| None).collect();

        let mut tasks = JoinSet::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let engine = Arc::clone(self);
            tasks.spawn_blocking(move || (index, engine.run_cycle(input)));
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => {
                    error!(error = %e, "Decision cycle task failed");
                    self.halt_on(&GovernanceError::Halted(e.to_string()));
                }
            }
        }

        results
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|| Err(GovernanceError::Halted("decision cycle task failed".into())))
            })
            .collect()
    }

    /// Admit the cycle's identifier through `ingress`, then run the cycle.
    ///
    /// An identifier that cannot be admitted within the ingress timeout is
    /// rejected as unknown.
    pub async fn admit_and_run(
        self: &Arc<Self>,
        ingress: &Ingress,
        input: CycleInput,
    ) -> GovernanceResult<CycleOutcome> {
        self.ensure_running()?;

        if let Err(err) = ingress.admit(&input.identifier).await {
            return self
                .reject(Uuid::new_v4(), &input.identifier, None, err)
                .inspect_err(|err| self.halt_on(err));
        }

        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.run_cycle(input))
            .await
            .map_err(|e| {
                let err = GovernanceError::Halted(e.to_string());
                self.halt_on(&err);
                err
            })?
    }

    fn run_gated(&self, scope: GatedKey, input: CycleInput) -> GovernanceResult<CycleOutcome> {
        let lock = self.scope_lock(scope.key());
        // The guard protects no data; a panicked holder leaves nothing to repair.
        let _serial = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut cycle = DecisionCycle::new(scope, self.alpha.clone());
        let cycle_id = cycle.id();
        let span = info_span!("decision_cycle", cycle_id = %cycle_id, scope = %cycle.scope());
        let _enter = span.enter();

        let window = match self.gate_window(cycle.scope(), &input.window) {
            Ok(window) => window,
            Err(err) => {
                let scope = Some(cycle.scope().key().clone());
                return self.reject(cycle_id, &input.identifier, scope, err);
            }
        };

        let ungated = self.gate_required(cycle_id, &input.required)?;

        let (proposal, mut breach) = if ungated.is_empty() {
            let proposal = self.router.propose(&window);
            self.audit.append_proposal(cycle_id, &proposal)?;
            let verdict = self.guardian.evaluate(&proposal, &input.risk);
            (Some(proposal), verdict.into_breach())
        } else {
            warn!(ungated = ?ungated, "Required inputs failed the gate; routing skipped");
            (None, None)
        };

        let band = proposal.as_ref().map(RoutingProposal::band);
        let mut invalidated = Vec::new();
        let mut advisories = Vec::new();
        let mut firings = Vec::new();

        for submission in input.delegated {
            let DelegatedSubmission {
                holder,
                grant,
                action,
            } = submission;
            let kind = attempt_kind(&action);

            let accepted = match action {
                DelegatedAction::Binding { action } => Err(binding_refused(&holder, &action)),
                DelegatedAction::Proposal { regime, action } => self
                    .authorize(cycle.scope(), band, Phase::Routing, grant, &holder)
                    .and_then(|_| {
                        band.ok_or_else(|| GovernanceError::InvalidDelegation {
                            holder: holder.clone(),
                            reason: "routing did not run in this cycle".into(),
                        })
                    })
                    .map(|band| {
                        advisories.push(
                            RoutingProposal::new(cycle.scope().key().clone(), band, regime, action)
                                .proposed_by(Proposer::Delegate {
                                    holder: holder.clone(),
                                    grant,
                                }),
                        );
                    }),
                DelegatedAction::Breach { firings: extra } => self
                    .authorize(cycle.scope(), band, Phase::RiskEval, grant, &holder)
                    .map(|_| firings.extend(extra)),
            };

            if let Err(err) = accepted {
                self.audit.diagnostics().record(
                    cycle_id,
                    holder,
                    Some(grant),
                    cycle.scope().key().clone(),
                    kind,
                    err.to_string(),
                );
                invalidated.push(err);
            }
        }

        for advisory in &advisories {
            self.audit.append_proposal(cycle_id, advisory)?;
        }
        breach = merge_breach(breach, firings);
        if let Some(breach) = &breach {
            info!(
                action = %breach.action(),
                predicate = %breach.trigger().predicate,
                firings = breach.firings().len(),
                "Breach signalled"
            );
            self.audit.append_breach(cycle_id, cycle.scope().key(), breach)?;
        }

        let ruling = self.resolver.decide(ResolutionInput {
            scope: cycle.scope(),
            ungated: &ungated,
            proposal: proposal.as_ref(),
            breach: breach.as_ref(),
        })?;
        let ruling = cycle.bind(ruling)?;
        let decision = self.audit.append_decision(cycle_id, ruling)?;

        Ok(CycleOutcome::Decided {
            decision,
            invalidated,
        })
    }

    /// Normalize the scope's own window. Every signal must belong to the
    /// cycle's scope, and an empty window is missing input.
    fn gate_window(&self, scope: &GatedKey, raws: &[RawSignal]) -> GovernanceResult<SignalWindow> {
        if raws.is_empty() {
            return Err(GovernanceError::OutOfDomain {
                field: "window".into(),
                violation: DomainViolation::Missing,
            });
        }
        for raw in raws {
            let key = self.canonicalizer.resolve(&raw.identifier)?;
            if key != *scope {
                return Err(GovernanceError::OutOfDomain {
                    field: "window".into(),
                    violation: DomainViolation::ForeignScope {
                        scope: key.key().to_string(),
                    },
                });
            }
        }
        self.normalizer.normalize_window(raws, scope)
    }

    /// Gate every auxiliary input; return the identifiers that failed.
    /// Each failure is appended as a rejection.
    fn gate_required(&self, cycle_id: Uuid, raws: &[RawSignal]) -> GovernanceResult<Vec<String>> {
        let mut ungated = Vec::new();
        for raw in raws {
            let failure = match self.canonicalizer.resolve(&raw.identifier) {
                Err(err) => Some((None, err)),
                Ok(key) => match self.normalizer.normalize(raw, &key) {
                    Ok(_) => None,
                    Err(err) => Some((Some(key.into_key()), err)),
                },
            };
            if let Some((scope, err)) = failure {
                self.audit
                    .append_rejection(cycle_id, raw.identifier.clone(), scope, &err)?;
                ungated.push(raw.identifier.clone());
            }
        }
        Ok(ungated)
    }

    fn authorize(
        &self,
        scope: &GatedKey,
        band: Option<RegimeBand>,
        phase: Phase,
        grant: GrantId,
        holder: &AuthorityId,
    ) -> GovernanceResult<()> {
        let mut ctx = DelegationContext::new(phase, scope.key().clone(), Utc::now());
        if let Some(band) = band {
            ctx = ctx.with_band(band);
        }
        self.ledger.authorize(grant, holder, &ctx).map(|_| ())
    }

    fn reject(
        &self,
        cycle_id: Uuid,
        identifier: &str,
        scope: Option<CanonicalKey>,
        error: GovernanceError,
    ) -> GovernanceResult<CycleOutcome> {
        warn!(identifier, code = error.code(), error = %error, "Input rejected at the gate");
        self.audit
            .append_rejection(cycle_id, identifier, scope, &error)?;
        Ok(CycleOutcome::Rejected { error })
    }

    fn scope_lock(&self, key: &CanonicalKey) -> Arc<Mutex<()>> {
        Arc::clone(self.scope_locks.entry(key.clone()).or_default().value())
    }

    fn ensure_running(&self) -> GovernanceResult<()> {
        if self.is_halted() {
            return Err(GovernanceError::Halted(
                "engine halted after a fatal error".into(),
            ));
        }
        Ok(())
    }

    fn halt_on(&self, err: &GovernanceError) {
        if err.is_fatal() && !self.halted.swap(true, Ordering::SeqCst) {
            error!(code = err.code(), error = %err, "Fatal governance error; engine halted");
        }
    }
}

fn attempt_kind(action: &DelegatedAction) -> AttemptKind {
    match action {
        DelegatedAction::Proposal { .. } => AttemptKind::Proposal,
        DelegatedAction::Breach { .. } => AttemptKind::Breach,
        DelegatedAction::Binding { .. } => AttemptKind::Binding,
    }
}

fn binding_refused(holder: &AuthorityId, action: &DecisionAction) -> GovernanceError {
    GovernanceError::InvalidDelegation {
        holder: holder.clone(),
        reason: format!(
            "binding decision '{}' may only be issued by Alpha",
            action.label()
        ),
    }
}

fn merge_breach(breach: Option<BreachSignal>, extra: Vec<PredicateFiring>) -> Option<BreachSignal> {
    match (breach, BreachSignal::from_firings(extra)) {
        (Some(breach), Some(extra)) => Some(breach.merge(extra)),
        (breach, extra) => breach.or(extra),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelegationSpec;
    use sovereign_gate::{FieldBounds, NormalizerConfig};
    use sovereign_guardian::RiskState;
    use sovereign_types::{EnforcementAction, GrantCondition, Identity, PredicateKind};

    fn config() -> GovernanceConfig {
        GovernanceConfig {
            identities: vec![Identity::new("SP500").with_alias("SPY")],
            normalizer: NormalizerConfig::default()
                .with_field("volatility", FieldBounds::new(0.0, 5.0))
                .with_field("drawdown", FieldBounds::new(-1.0, 1.0)),
            delegations: vec![DelegationSpec {
                holder: AuthorityId::new("GUARDIAN"),
                phases: vec![Phase::RiskEval],
                scopes: None,
                condition: GrantCondition::Always,
            }],
            ..GovernanceConfig::default()
        }
    }

    fn input() -> CycleInput {
        CycleInput::new("SPY").with_signal(RawSignal::new("SPY", Utc::now()).with_field("volatility", 0.2))
    }

    #[test]
    fn calm_window_is_ratified() {
        let engine = DecisionEngine::from_config(&config()).unwrap();
        let outcome = engine.run_cycle(input()).unwrap();
        let decision = outcome.decision().unwrap();

        assert_eq!(decision.issuer(), &AuthorityId::alpha());
        assert_eq!(decision.scope().as_str(), "SP500");
        assert!(matches!(decision.action(), DecisionAction::Route { .. }));
        // proposal, decision
        assert_eq!(engine.audit().len(), 2);
        assert_eq!(decision.sequence(), 2);
    }

    #[test]
    fn empty_window_is_rejected() {
        let engine = DecisionEngine::from_config(&config()).unwrap();
        let outcome = engine.run_cycle(CycleInput::new("SPY")).unwrap();
        assert!(matches!(
            outcome.rejection(),
            Some(GovernanceError::OutOfDomain { violation: DomainViolation::Missing, .. })
        ));
        assert!(engine.audit().decisions().is_empty());
    }

    #[test]
    fn foreign_signal_in_window_is_rejected() {
        let mut config = config();
        config.identities.push(Identity::new("NDX"));
        let engine = DecisionEngine::from_config(&config).unwrap();
        let outcome = engine
            .run_cycle(input().with_signal(RawSignal::new("NDX", Utc::now())))
            .unwrap();
        assert_eq!(
            outcome.rejection(),
            Some(&GovernanceError::OutOfDomain {
                field: "window".into(),
                violation: DomainViolation::ForeignScope {
                    scope: "NDX".into()
                },
            })
        );
    }

    #[test]
    fn binding_for_unknown_identifier_is_rejected_on_the_trace() {
        let engine = DecisionEngine::from_config(&config()).unwrap();
        let err = engine
            .submit_binding(
                AuthorityId::new("GUARDIAN"),
                GrantId(1),
                "AAPL",
                DecisionAction::Deny {
                    reason: sovereign_types::DenyReason::NoValidProposal,
                },
            )
            .unwrap_err();
        assert_eq!(err, GovernanceError::UnknownIdentifier("AAPL".into()));

        let records = engine.audit().export();
        assert_eq!(records.len(), 1);
        assert!(matches!(
            &records[0].entry,
            sovereign_audit::AuditEntry::Rejection { identifier, code, .. }
                if identifier == "AAPL" && code == "UNKNOWN_IDENTIFIER"
        ));
        assert!(engine.audit().diagnostics().is_empty());
        assert!(!engine.is_halted());
    }

    #[test]
    fn configured_key_anchors_the_trace() {
        let config = GovernanceConfig {
            alpha_signing_key: Some("07".repeat(32)),
            ..config()
        };
        let engine = DecisionEngine::from_config(&config).unwrap();
        let expected = SigningKey::from_bytes(&[7u8; 32]).verifying_key();
        assert_eq!(engine.anchor(), &expected);

        let decision = engine.run_cycle(input()).unwrap().decision().cloned().unwrap();
        sovereign_audit::verify_decision(&decision, &expected).unwrap();
        assert_eq!(decision.key_fingerprint(), Some(key_fingerprint(&expected).as_str()));
    }

    #[test]
    fn delegated_breach_merges_into_verdict() {
        let engine = DecisionEngine::from_config(&config()).unwrap();
        let firing = PredicateFiring::new(
            PredicateKind::ConstraintViolation,
            EnforcementAction::Freeze,
            1.0,
            0.0,
        );
        let outcome = engine
            .run_cycle(
                input()
                    .with_risk(RiskState::default().with_drawdown(0.5))
                    .with_submission(DelegatedSubmission::breach(
                        AuthorityId::new("GUARDIAN"),
                        GrantId(1),
                        vec![firing],
                    )),
            )
            .unwrap();

        let decision = outcome.decision().unwrap();
        assert_eq!(decision.action().enforcement(), Some(EnforcementAction::Freeze));
    }

    #[test]
    fn delegated_proposal_without_grant_is_invalidated() {
        let engine = DecisionEngine::from_config(&config()).unwrap();
        let outcome = engine
            .run_cycle(input().with_submission(DelegatedSubmission::proposal(
                AuthorityId::new("GUARDIAN"),
                GrantId(1),
                "risk-on",
                sovereign_types::ActionDescriptor::new("increase"),
            )))
            .unwrap();

        match outcome {
            CycleOutcome::Decided { invalidated, .. } => {
                assert_eq!(invalidated.len(), 1);
                assert!(matches!(invalidated[0], GovernanceError::InvalidDelegation { .. }));
            }
            other => panic!("expected a decision, got {other:?}"),
        }
        assert_eq!(engine.audit().diagnostics().len(), 1);
    }

    #[test]
    fn halted_engine_refuses_cycles() {
        let engine = DecisionEngine::from_config(&config()).unwrap();
        engine.halt_on(&GovernanceError::RetroactiveMutation { sequence: 1 });
        assert!(engine.is_halted());
        assert!(matches!(
            engine.run_cycle(input()),
            Err(GovernanceError::Halted(_))
        ));
    }

    #[test]
    fn merge_keeps_strongest_action() {
        let unwind = PredicateFiring::new(
            PredicateKind::LossThreshold,
            EnforcementAction::Unwind,
            0.3,
            0.2,
        );
        let deny = PredicateFiring::new(
            PredicateKind::ExposureLimit,
            EnforcementAction::Deny,
            1.4,
            1.0,
        );
        let base = BreachSignal::from_firings(vec![deny]);
        let merged = merge_breach(base, vec![unwind]).unwrap();
        assert_eq!(merged.action(), EnforcementAction::Unwind);
        assert_eq!(merged.firings().len(), 2);

        assert!(merge_breach(None, Vec::new()).is_none());
    }
}
