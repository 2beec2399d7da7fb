use std::collections::BTreeMap;

use sovereign_gate::{field_key, SignalWindow};
use sovereign_types::{RegimeBand, RoutingProposal};
use tracing::debug;

use crate::config::{BandPolicy, RouterConfig};
use crate::error::RouterError;

/// Deterministic regime router.
///
/// `propose` is a pure function of the window and the configuration: fields
/// are visited in `BTreeMap` order and signals in window order, so identical
/// inputs give bit-identical proposals.
#[derive(Clone, Debug)]
pub struct RegimeRouter {
    config: RouterConfig,
    /// Indexed by `RegimeBand::index`.
    policies: [BandPolicy; 4],
}

impl RegimeRouter {
    /// Weight names are folded to lowercase to match normalized signal fields.
    pub fn new(mut config: RouterConfig) -> Result<Self, RouterError> {
        let mut weights = BTreeMap::new();
        for (field, weight) in std::mem::take(&mut config.weights) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RouterError::InvalidWeight { field });
            }
            if weights.insert(field_key(&field), weight).is_some() {
                return Err(RouterError::DuplicateWeight { field });
            }
        }
        config.weights = weights;

        let [t0, t1, t2] = config.thresholds;
        let finite = config.thresholds.iter().all(|t| t.is_finite());
        if !finite || t0 <= 0.0 || t0 >= t1 || t1 >= t2 {
            return Err(RouterError::InvalidThresholds(config.thresholds));
        }

        if config.max_window == 0 {
            return Err(RouterError::EmptyWindowLimit);
        }

        let mut by_band = BTreeMap::new();
        for policy in &config.band_policies {
            if by_band.insert(policy.band, policy.clone()).is_some() {
                return Err(RouterError::DuplicatePolicy(policy.band));
            }
        }
        let mut take = |band: RegimeBand| by_band.remove(&band).ok_or(RouterError::MissingPolicy(band));
        let policies = [
            take(RegimeBand::Calm)?,
            take(RegimeBand::Tense)?,
            take(RegimeBand::Fragile)?,
            take(RegimeBand::Critical)?,
        ];

        Ok(Self { config, policies })
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Propose a routing action for the window's scope.
    pub fn propose(&self, window: &SignalWindow) -> RoutingProposal {
        let (score, coverage) = self.score(window);
        let band = self.band_for(score);
        let confidence = self.boundary_margin(score, band) * coverage;

        debug!(
            scope = %window.scope(),
            score,
            band = %band,
            confidence,
            signals = window.len(),
            "Regime proposal computed"
        );

        let policy = &self.policies[band.index()];
        let proposal = RoutingProposal::new(
            window.scope().clone(),
            band,
            policy.regime.clone(),
            policy.descriptor(),
        )
        .with_score(score)
        .with_confidence(confidence);
        match window.latest_timestamp() {
            Some(at) => proposal.observed_through(at),
            None => proposal,
        }
    }

    /// Weighted stress score and the share of weight actually observed.
    fn score(&self, window: &SignalWindow) -> (f64, f64) {
        let signals = window.tail(self.config.max_window);
        let total_weight: f64 = self.config.weights.values().sum();

        let mut score = 0.0;
        let mut covered = 0.0;
        for (field, weight) in &self.config.weights {
            let (sum, count) = signals
                .iter()
                .filter_map(|s| s.value(field))
                .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
            if count > 0 {
                score += weight * (sum / count as f64).abs();
                covered += weight;
            }
        }

        let coverage = if total_weight > 0.0 {
            covered / total_weight
        } else {
            0.0
        };
        (score, coverage)
    }

    fn band_for(&self, score: f64) -> RegimeBand {
        let [t0, t1, t2] = self.config.thresholds;
        if score < t0 {
            RegimeBand::Calm
        } else if score < t1 {
            RegimeBand::Tense
        } else if score < t2 {
            RegimeBand::Fragile
        } else {
            RegimeBand::Critical
        }
    }

    /// Distance to the nearest band boundary, scaled to `[0, 1]`.
    fn boundary_margin(&self, score: f64, band: RegimeBand) -> f64 {
        let [t0, t1, t2] = self.config.thresholds;
        let inner = |lo: f64, hi: f64| (score - lo).min(hi - score) / ((hi - lo) / 2.0);
        let margin = match band {
            RegimeBand::Calm => (t0 - score) / t0,
            RegimeBand::Tense => inner(t0, t1),
            RegimeBand::Fragile => inner(t1, t2),
            RegimeBand::Critical => (score - t2) / (t2 - t1),
        };
        margin.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use sovereign_gate::{Canonicalizer, FieldBounds, Normalizer, NormalizerConfig};
    use sovereign_types::{Identity, RawSignal};

    const FIELDS: [&str; 5] = ["volatility", "liquidity", "flow", "tail_risk", "stress"];

    fn window(rows: &[[f64; 5]]) -> SignalWindow {
        let canon = Canonicalizer::new(vec![Identity::new("SP500").with_alias("SPY")]).unwrap();
        let normalizer = Normalizer::new(FIELDS.iter().fold(NormalizerConfig::default(), |c, f| {
            c.with_field(*f, FieldBounds::new(0.0, 1.0))
        }))
        .unwrap();
        let key = canon.resolve("spy").unwrap();

        let start = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();
        let raws: Vec<RawSignal> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                FIELDS.iter().zip(row).fold(
                    RawSignal::new("SPY", start + Duration::minutes(i as i64)),
                    |raw, (f, v)| raw.with_field(*f, *v),
                )
            })
            .collect();
        normalizer.normalize_window(&raws, &key).unwrap()
    }

    fn router() -> RegimeRouter {
        RegimeRouter::new(RouterConfig::default()).unwrap()
    }

    #[test]
    fn quiet_window_is_calm_risk_on() {
        let proposal = router().propose(&window(&[[0.1, 0.1, 0.0, 0.1, 0.1]; 3]));
        assert_eq!(proposal.band(), RegimeBand::Calm);
        assert_eq!(proposal.regime(), "risk-on");
        assert_eq!(proposal.action().kind, "increase");
        assert!(proposal.is_advisory());
        assert!(!proposal.is_delegated());
    }

    #[test]
    fn stressed_window_proposes_risk_off_reduce() {
        // 1.0*0.5 + 1.4*0.5 + 1.2*0.5 + 1.6*0.5 + 2.0*0.5 = 3.6
        let proposal = router().propose(&window(&[[0.5; 5]; 4]));
        assert_eq!(proposal.band(), RegimeBand::Fragile);
        assert_eq!(proposal.regime(), "risk-off");
        assert_eq!(proposal.action().kind, "reduce");
        assert_eq!(proposal.action().target_allocation, Some(0.3));
        assert!((proposal.score() - 3.6).abs() < 1e-9);
    }

    #[test]
    fn saturated_window_is_critical() {
        let proposal = router().propose(&window(&[[1.0; 5]]));
        assert_eq!(proposal.band(), RegimeBand::Critical);
        assert_eq!(proposal.action().kind, "exit");
    }

    #[test]
    fn only_recent_signals_are_scored() {
        let config = RouterConfig {
            max_window: 1,
            ..RouterConfig::default()
        };
        let router = RegimeRouter::new(config).unwrap();
        let proposal = router.propose(&window(&[[1.0; 5], [1.0; 5], [0.0; 5]]));
        assert_eq!(proposal.band(), RegimeBand::Calm);
        assert_eq!(proposal.score(), 0.0);
    }

    #[test]
    fn empty_window_has_zero_confidence() {
        let proposal = router().propose(&window(&[]));
        assert_eq!(proposal.band(), RegimeBand::Calm);
        assert_eq!(proposal.confidence(), 0.0);
        assert!(proposal.observed_at().is_none());
    }

    #[test]
    fn weight_names_match_ignoring_case() {
        let mut config = RouterConfig::default();
        let tail = config.weights.remove("tail_risk").unwrap();
        config.weights.insert("Tail_Risk".into(), tail);
        let mixed = RegimeRouter::new(config).unwrap();
        assert!(mixed.config().weights.contains_key("tail_risk"));

        let w = window(&[[0.5; 5]; 4]);
        assert_eq!(
            mixed.propose(&w).score().to_bits(),
            router().propose(&w).score().to_bits()
        );

        let mut twice = RouterConfig::default();
        twice.weights.insert("FLOW".into(), 1.0);
        assert_eq!(
            RegimeRouter::new(twice).unwrap_err(),
            RouterError::DuplicateWeight { field: "flow".into() }
        );
    }

    #[test]
    fn invalid_configs_are_refused() {
        let unordered = RouterConfig {
            thresholds: [2.5, 1.2, 4.0],
            ..RouterConfig::default()
        };
        assert!(matches!(
            RegimeRouter::new(unordered),
            Err(RouterError::InvalidThresholds(_))
        ));

        let mut missing = RouterConfig::default();
        missing.band_policies.retain(|p| p.band != RegimeBand::Tense);
        assert_eq!(
            RegimeRouter::new(missing).unwrap_err(),
            RouterError::MissingPolicy(RegimeBand::Tense)
        );

        let mut negative = RouterConfig::default();
        negative.weights.insert("flow".into(), -1.0);
        assert!(matches!(
            RegimeRouter::new(negative),
            Err(RouterError::InvalidWeight { .. })
        ));
    }

    proptest! {
        #[test]
        fn proposals_are_bit_identical_for_identical_windows(
            rows in prop::collection::vec(prop::array::uniform5(0.0f64..=1.0), 0..12)
        ) {
            let router = router();
            let w = window(&rows);
            let first = router.propose(&w);
            let second = router.propose(&w.clone());

            prop_assert_eq!(first.score().to_bits(), second.score().to_bits());
            prop_assert_eq!(first.confidence().to_bits(), second.confidence().to_bits());
            prop_assert_eq!(
                serde_json::to_string(&first).unwrap(),
                serde_json::to_string(&second).unwrap()
            );
        }

        #[test]
        fn confidence_stays_in_unit_range(
            rows in prop::collection::vec(prop::array::uniform5(0.0f64..=1.0), 1..12)
        ) {
            let proposal = router().propose(&window(&rows));
            prop_assert!((0.0..=1.0).contains(&proposal.confidence()));
        }
    }
}
