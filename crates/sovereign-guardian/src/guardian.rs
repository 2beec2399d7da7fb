use sovereign_types::{
    BreachSignal, GuardianVerdict, PredicateFiring, PredicateKind, RoutingProposal,
};
use tracing::{debug, warn};

use crate::config::GuardianConfig;
use crate::error::GuardianError;
use crate::state::RiskState;

/// Boundary predicate evaluator.
///
/// Predicates run in a fixed order (loss, exposure, constraint, shock) and
/// every firing is reported. Non-finite observations fire their predicate:
/// a value that cannot be compared is never treated as safe.
#[derive(Clone, Debug)]
pub struct Guardian {
    config: GuardianConfig,
}

impl Guardian {
    pub fn new(config: GuardianConfig) -> Result<Self, GuardianError> {
        let check = |predicate, value: f64, positive: bool| {
            if !value.is_finite() || (positive && value <= 0.0) || value < 0.0 {
                Err(GuardianError::InvalidThreshold {
                    predicate,
                    reason: format!("{value} is not a usable threshold"),
                })
            } else {
                Ok(())
            }
        };
        check(PredicateKind::LossThreshold, config.loss.max_drawdown, false)?;
        check(PredicateKind::ExposureLimit, config.exposure.max_exposure, true)?;
        check(PredicateKind::ShockCrash, config.shock.crash_span, true)?;
        check(PredicateKind::ShockCrash, config.shock.elasticity_floor, false)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GuardianConfig {
        &self.config
    }

    /// Evaluate every predicate. Side-effect free.
    pub fn evaluate(&self, proposal: &RoutingProposal, state: &RiskState) -> GuardianVerdict {
        let firings: Vec<PredicateFiring> = [
            self.loss(state),
            self.exposure(proposal, state),
            self.constraints(state),
            self.shock(state),
        ]
        .into_iter()
        .flatten()
        .collect();

        match BreachSignal::from_firings(firings) {
            Some(breach) => {
                warn!(
                    scope = %proposal.scope(),
                    action = %breach.action(),
                    trigger = %breach.trigger().predicate,
                    fired = breach.firings().len(),
                    "Guardian breach"
                );
                GuardianVerdict::Breach(breach)
            }
            None => {
                debug!(scope = %proposal.scope(), "Guardian pass-through");
                GuardianVerdict::PassThrough
            }
        }
    }

    fn loss(&self, state: &RiskState) -> Option<PredicateFiring> {
        let rule = &self.config.loss;
        let drawdown = state.drawdown;
        (!drawdown.is_finite() || drawdown > rule.max_drawdown).then(|| {
            PredicateFiring::new(
                PredicateKind::LossThreshold,
                rule.action,
                drawdown,
                rule.max_drawdown,
            )
            .with_detail("drawdown above loss threshold")
        })
    }

    fn exposure(&self, proposal: &RoutingProposal, state: &RiskState) -> Option<PredicateFiring> {
        let rule = &self.config.exposure;
        let fire = |observed: f64, detail: &str| {
            PredicateFiring::new(
                PredicateKind::ExposureLimit,
                rule.action,
                observed,
                rule.max_exposure,
            )
            .with_detail(detail)
        };

        if !state.exposure.is_finite() || state.exposure > rule.max_exposure {
            return Some(fire(state.exposure, "current exposure above limit"));
        }
        match proposal.action().target_allocation {
            Some(target) if !target.is_finite() || target > rule.max_exposure => {
                Some(fire(target, "proposed allocation above limit"))
            }
            _ => None,
        }
    }

    fn constraints(&self, state: &RiskState) -> Option<PredicateFiring> {
        if state.constraint_flags.is_empty() {
            return None;
        }
        let flags: Vec<&str> = state.constraint_flags.iter().map(String::as_str).collect();
        Some(
            PredicateFiring::new(
                PredicateKind::ConstraintViolation,
                self.config.constraints.action,
                flags.len() as f64,
                0.0,
            )
            .with_detail(flags.join(",")),
        )
    }

    fn shock(&self, state: &RiskState) -> Option<PredicateFiring> {
        let rule = &self.config.shock;
        let span = state.price_span.abs();
        let elasticity = state.elasticity;
        if !span.is_finite() || !elasticity.is_finite() {
            return Some(
                PredicateFiring::new(PredicateKind::ShockCrash, rule.action, span, rule.crash_span)
                    .with_detail("non-finite shock observation"),
            );
        }
        (span >= rule.crash_span && elasticity <= rule.elasticity_floor).then(|| {
            PredicateFiring::new(PredicateKind::ShockCrash, rule.action, span, rule.crash_span)
                .with_detail(format!(
                    "span {span} into elasticity {elasticity} (floor {})",
                    rule.elasticity_floor
                ))
        })
    }
}
