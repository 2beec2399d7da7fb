use ed25519_dalek::{SigningKey, VerifyingKey};
use sovereign_audit::{key_fingerprint, sign_ruling};
use sovereign_gate::GatedKey;
use sovereign_types::{
    AuthorityId, BreachSignal, DecisionAction, DecisionSource, DenyReason, GovernanceResult,
    Proposer, RoutingProposal, Ruling,
};

/// Everything Alpha resolves in one cycle.
#[derive(Clone, Copy, Debug)]
pub struct ResolutionInput<'a> {
    pub scope: &'a GatedKey,
    /// Required inputs that failed canonicalization or normalization.
    pub ungated: &'a [String],
    pub proposal: Option<&'a RoutingProposal>,
    pub breach: Option<&'a BreachSignal>,
}

/// The capability to resolve a cycle into a binding ruling.
///
/// Injected into the engine rather than reached through global state, so a
/// test can substitute its own resolver. The engine still refuses to bind a
/// ruling whose issuer is not the configured Alpha or that is not signed by
/// Alpha's key.
pub trait AuthorityResolver: Send + Sync {
    fn authority(&self) -> &AuthorityId;

    fn decide(&self, input: ResolutionInput<'_>) -> GovernanceResult<Ruling>;
}

/// The sovereign resolver.
///
/// Rules apply strictly in order; the first that matches decides:
///
/// 1. any ungated required input: deny with `ungated-input`
/// 2. a breach: its enforcement action, the proposal is discarded
/// 3. a router proposal: ratified as issued by Alpha; delegated proposals
///    never bind
/// 4. otherwise: deny with `no-valid-proposal`
///
/// Every ruling is signed with Alpha's key before it leaves the resolver.
#[derive(Clone, Debug)]
pub struct AlphaResolver {
    id: AuthorityId,
    key: SigningKey,
}

impl AlphaResolver {
    pub fn new(id: AuthorityId, key: SigningKey) -> Self {
        Self { id, key }
    }

    /// The identity anchor the audit trace checks signatures against.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    pub fn key_fingerprint(&self) -> String {
        key_fingerprint(&self.key.verifying_key())
    }

    fn rule(&self, input: ResolutionInput<'_>) -> Ruling {
        let scope = input.scope.key().clone();

        if !input.ungated.is_empty() {
            return Ruling::new(
                scope,
                DecisionAction::Deny {
                    reason: DenyReason::UngatedInput,
                },
                DecisionSource::Gate {
                    rejected: input.ungated.to_vec(),
                },
                self.id.clone(),
            );
        }

        if let Some(breach) = input.breach {
            return Ruling::new(
                scope,
                DecisionAction::Enforce {
                    action: breach.action(),
                },
                DecisionSource::Breach {
                    predicate: breach.trigger().predicate,
                    firings: breach.firings().len(),
                },
                self.id.clone(),
            );
        }

        match input.proposal {
            Some(proposal) if *proposal.proposer() == Proposer::Router => Ruling::new(
                scope,
                DecisionAction::Route {
                    action: proposal.action().clone(),
                },
                DecisionSource::Proposal {
                    regime: proposal.regime().to_string(),
                    band: proposal.band(),
                    proposer: Proposer::Router,
                },
                self.id.clone(),
            ),
            _ => Ruling::new(
                scope,
                DecisionAction::Deny {
                    reason: DenyReason::NoValidProposal,
                },
                DecisionSource::Absent,
                self.id.clone(),
            ),
        }
    }
}

impl AuthorityResolver for AlphaResolver {
    fn authority(&self) -> &AuthorityId {
        &self.id
    }

    fn decide(&self, input: ResolutionInput<'_>) -> GovernanceResult<Ruling> {
        Ok(sign_ruling(self.rule(input), &self.key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sovereign_audit::verify_ruling;
    use sovereign_gate::Canonicalizer;
    use sovereign_types::{
        ActionDescriptor, CanonicalKey, EnforcementAction, GrantId, Identity, PredicateFiring,
        PredicateKind, RegimeBand,
    };

    fn resolver() -> AlphaResolver {
        AlphaResolver::new(AuthorityId::alpha(), SigningKey::from_bytes(&[7u8; 32]))
    }

    fn scope() -> GatedKey {
        Canonicalizer::new(vec![Identity::new("SP500").with_alias("SPY")])
            .unwrap()
            .resolve("SPY")
            .unwrap()
    }

    fn proposal() -> RoutingProposal {
        RoutingProposal::new(
            CanonicalKey::new("SP500"),
            RegimeBand::Fragile,
            "risk-off",
            ActionDescriptor::new("reduce").with_target(0.3),
        )
    }

    fn freeze() -> BreachSignal {
        BreachSignal::from_firings(vec![PredicateFiring::new(
            PredicateKind::ShockCrash,
            EnforcementAction::Freeze,
            0.4,
            0.25,
        )])
        .unwrap()
    }

    #[test]
    fn breach_overrides_proposal() {
        let scope = scope();
        let proposal = proposal();
        let breach = freeze();
        let ruling = resolver().decide(ResolutionInput {
            scope: &scope,
            ungated: &[],
            proposal: Some(&proposal),
            breach: Some(&breach),
        })
        .unwrap();

        assert_eq!(ruling.action().label(), "freeze");
        assert_eq!(ruling.issuer(), &AuthorityId::alpha());
        assert!(matches!(ruling.source(), DecisionSource::Breach { .. }));
    }

    #[test]
    fn ungated_input_denies_before_breach() {
        let scope = scope();
        let breach = freeze();
        let ungated = vec!["VIX".to_string()];
        let ruling = resolver().decide(ResolutionInput {
            scope: &scope,
            ungated: &ungated,
            proposal: None,
            breach: Some(&breach),
        })
        .unwrap();

        assert_eq!(
            ruling.action(),
            &DecisionAction::Deny {
                reason: DenyReason::UngatedInput
            }
        );
    }

    #[test]
    fn router_proposal_is_ratified() {
        let scope = scope();
        let proposal = proposal();
        let ruling = resolver().decide(ResolutionInput {
            scope: &scope,
            ungated: &[],
            proposal: Some(&proposal),
            breach: None,
        })
        .unwrap();
        assert_eq!(ruling.action().label(), "reduce");
        assert_eq!(ruling.scope().as_str(), "SP500");
    }

    #[test]
    fn delegated_proposal_never_binds() {
        let scope = scope();
        let delegated = proposal().proposed_by(Proposer::Delegate {
            holder: AuthorityId::new("ADVISOR"),
            grant: GrantId(1),
        });
        let ruling = resolver().decide(ResolutionInput {
            scope: &scope,
            ungated: &[],
            proposal: Some(&delegated),
            breach: None,
        })
        .unwrap();
        assert_eq!(
            ruling.action(),
            &DecisionAction::Deny {
                reason: DenyReason::NoValidProposal
            }
        );
        assert_eq!(ruling.source(), &DecisionSource::Absent);
    }

    #[test]
    fn rulings_are_signed_with_alpha_key() {
        let scope = scope();
        let resolver = resolver();
        let ruling = resolver
            .decide(ResolutionInput {
                scope: &scope,
                ungated: &[],
                proposal: None,
                breach: None,
            })
            .unwrap();

        verify_ruling(&ruling, &resolver.verifying_key()).unwrap();
        assert_eq!(
            ruling.signature().map(|s| s.key_fingerprint.clone()),
            Some(resolver.key_fingerprint())
        );
    }
}
