use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sovereign_types::{DomainViolation, GovernanceError, GovernanceResult, RawSignal};
use tracing::{debug, warn};

use crate::canonicalizer::GatedKey;
use crate::error::GateError;
use crate::signal::{Signal, SignalWindow};

/// What to do with a value outside the hard floor/ceiling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnViolation {
    #[default]
    Reject,
    /// Clamp into bounds. Must be opted into per field.
    Clamp,
}

/// Hard bounds and output scaling for one signal field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldBounds {
    pub floor: f64,
    pub ceiling: f64,
    /// Linear rescale of `[floor, ceiling]` onto this range. Identity when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_to: Option<[f64; 2]>,
    #[serde(default)]
    pub on_violation: OnViolation,
    /// Whether a raw signal must carry this field.
    #[serde(default)]
    pub required: bool,
}

impl FieldBounds {
    pub fn new(floor: f64, ceiling: f64) -> Self {
        Self {
            floor,
            ceiling,
            scale_to: None,
            on_violation: OnViolation::Reject,
            required: false,
        }
    }

    pub fn scaled_to(mut self, low: f64, high: f64) -> Self {
        self.scale_to = Some([low, high]);
        self
    }

    pub fn clamping(mut self) -> Self {
        self.on_violation = OnViolation::Clamp;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn validate(&self, field: &str) -> Result<(), GateError> {
        let invalid = |reason: &str| GateError::InvalidBounds {
            field: field.to_string(),
            reason: reason.to_string(),
        };
        if !self.floor.is_finite() || !self.ceiling.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if self.floor >= self.ceiling {
            return Err(invalid("floor must be below ceiling"));
        }
        if let Some([low, high]) = self.scale_to {
            if !low.is_finite() || !high.is_finite() || low >= high {
                return Err(invalid("scale range must be finite and increasing"));
            }
        }
        Ok(())
    }

    fn apply(&self, field: &str, value: f64) -> GovernanceResult<f64> {
        let out_of_domain = |violation| GovernanceError::OutOfDomain {
            field: field.to_string(),
            violation,
        };
        if !value.is_finite() {
            return Err(out_of_domain(DomainViolation::NotFinite));
        }

        let bounded = if value < self.floor {
            match self.on_violation {
                OnViolation::Reject => {
                    return Err(out_of_domain(DomainViolation::BelowFloor {
                        value,
                        floor: self.floor,
                    }))
                }
                OnViolation::Clamp => self.floor,
            }
        } else if value > self.ceiling {
            match self.on_violation {
                OnViolation::Reject => {
                    return Err(out_of_domain(DomainViolation::AboveCeiling {
                        value,
                        ceiling: self.ceiling,
                    }))
                }
                OnViolation::Clamp => self.ceiling,
            }
        } else {
            value
        };

        Ok(match self.scale_to {
            Some([low, high]) => {
                let unit = (bounded - self.floor) / (self.ceiling - self.floor);
                low + unit * (high - low)
            }
            None => bounded,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldBounds>,
    /// Reject raw fields that have no configured bounds.
    #[serde(default = "default_reject_unconfigured")]
    pub reject_unconfigured: bool,
}

fn default_reject_unconfigured() -> bool {
    true
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
            reject_unconfigured: true,
        }
    }
}

impl NormalizerConfig {
    pub fn with_field(mut self, name: impl Into<String>, bounds: FieldBounds) -> Self {
        self.fields.insert(name.into(), bounds);
        self
    }
}

/// Field names are matched ignoring ASCII case; this is their stored form.
pub fn field_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Per-field bounding and scaling of raw signals.
///
/// Deterministic: the output depends only on the raw signal and the
/// configuration, never on wall-clock time or prior calls.
#[derive(Clone, Debug)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    /// Validates every bound and folds field names to lowercase. Two names
    /// that differ only in case are refused.
    pub fn new(config: NormalizerConfig) -> Result<Self, GateError> {
        let mut fields = BTreeMap::new();
        for (field, bounds) in config.fields {
            bounds.validate(&field)?;
            let key = field_key(&field);
            if fields.insert(key, bounds).is_some() {
                return Err(GateError::InvalidBounds {
                    field,
                    reason: "field configured twice ignoring case".to_string(),
                });
            }
        }
        Ok(Self {
            config: NormalizerConfig {
                fields,
                reject_unconfigured: config.reject_unconfigured,
            },
        })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one raw signal for an already-canonical scope.
    pub fn normalize(&self, raw: &RawSignal, key: &GatedKey) -> GovernanceResult<Signal> {
        let mut values = BTreeMap::new();

        for (raw_name, &value) in &raw.fields {
            let field = field_key(raw_name);
            match self.config.fields.get(&field) {
                Some(bounds) => {
                    let normalized = bounds.apply(&field, value).inspect_err(|_| {
                        warn!(scope = %key, field = %field, value, "Signal out of domain");
                    })?;
                    if values.insert(field.clone(), normalized).is_some() {
                        return Err(GovernanceError::OutOfDomain {
                            field,
                            violation: DomainViolation::DuplicateField,
                        });
                    }
                }
                None if self.config.reject_unconfigured => {
                    return Err(GovernanceError::OutOfDomain {
                        field,
                        violation: DomainViolation::Unconfigured,
                    });
                }
                None => {
                    debug!(scope = %key, field = %field, "Dropping unconfigured field");
                }
            }
        }

        if let Some((field, _)) = self
            .config
            .fields
            .iter()
            .find(|(name, bounds)| bounds.required && !values.contains_key(*name))
        {
            return Err(GovernanceError::OutOfDomain {
                field: field.clone(),
                violation: DomainViolation::Missing,
            });
        }

        Ok(Signal::new(key, raw.timestamp, values))
    }

    /// Normalize a whole window; the first rejection aborts it.
    pub fn normalize_window(
        &self,
        raws: &[RawSignal],
        key: &GatedKey,
    ) -> GovernanceResult<SignalWindow> {
        let signals = raws
            .iter()
            .map(|raw| self.normalize(raw, key))
            .collect::<GovernanceResult<Vec<_>>>()?;
        Ok(SignalWindow::new(key, signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonicalizer::gated;
    use chrono::Utc;

    fn normalizer() -> Normalizer {
        Normalizer::new(
            NormalizerConfig::default()
                .with_field("drawdown", FieldBounds::new(-1.0, 1.0))
                .with_field("volatility", FieldBounds::new(0.0, 2.0).scaled_to(0.0, 1.0))
                .with_field("flow", FieldBounds::new(-5.0, 5.0).clamping()),
        )
        .unwrap()
    }

    fn raw() -> RawSignal {
        RawSignal::new("SPY", Utc::now())
    }

    #[test]
    fn value_above_ceiling_is_rejected() {
        let err = normalizer()
            .normalize(&raw().with_field("drawdown", 1.2), &gated("SP500"))
            .unwrap_err();
        assert_eq!(
            err,
            GovernanceError::OutOfDomain {
                field: "drawdown".into(),
                violation: DomainViolation::AboveCeiling {
                    value: 1.2,
                    ceiling: 1.0
                },
            }
        );
    }

    #[test]
    fn values_are_scaled_into_target_range() {
        let signal = normalizer()
            .normalize(&raw().with_field("volatility", 0.5), &gated("SP500"))
            .unwrap();
        assert_eq!(signal.value("volatility"), Some(0.25));
        assert_eq!(signal.scope().as_str(), "SP500");
    }

    #[test]
    fn clamping_requires_opt_in() {
        let signal = normalizer()
            .normalize(&raw().with_field("flow", -9.0), &gated("SP500"))
            .unwrap();
        assert_eq!(signal.value("flow"), Some(-5.0));
    }

    #[test]
    fn non_finite_is_rejected_even_when_clamping() {
        let err = normalizer()
            .normalize(&raw().with_field("flow", f64::NAN), &gated("SP500"))
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::OutOfDomain {
                violation: DomainViolation::NotFinite,
                ..
            }
        ));
    }

    #[test]
    fn unconfigured_and_missing_fields() {
        let err = normalizer()
            .normalize(&raw().with_field("gamma", 0.1), &gated("SP500"))
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::OutOfDomain {
                violation: DomainViolation::Unconfigured,
                ..
            }
        ));

        let strict = Normalizer::new(
            NormalizerConfig::default().with_field("drawdown", FieldBounds::new(0.0, 1.0).required()),
        )
        .unwrap();
        let err = strict.normalize(&raw(), &gated("SP500")).unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::OutOfDomain {
                violation: DomainViolation::Missing,
                ..
            }
        ));
    }

    #[test]
    fn field_names_match_ignoring_case() {
        let n = Normalizer::new(
            NormalizerConfig::default()
                .with_field("TailRisk", FieldBounds::new(0.0, 1.0).required()),
        )
        .unwrap();
        assert!(n.config().fields.contains_key("tailrisk"));

        let signal = n
            .normalize(&raw().with_field("TAILRISK", 0.3), &gated("SP500"))
            .unwrap();
        assert_eq!(signal.value("tailrisk"), Some(0.3));

        let err = n
            .normalize(
                &raw().with_field("tailrisk", 0.3).with_field("TailRisk", 0.4),
                &gated("SP500"),
            )
            .unwrap_err();
        assert_eq!(
            err,
            GovernanceError::OutOfDomain {
                field: "tailrisk".into(),
                violation: DomainViolation::DuplicateField,
            }
        );
    }

    #[test]
    fn case_colliding_fields_are_refused() {
        let err = Normalizer::new(
            NormalizerConfig::default()
                .with_field("drawdown", FieldBounds::new(0.0, 1.0))
                .with_field("Drawdown", FieldBounds::new(0.0, 2.0)),
        )
        .unwrap_err();
        assert!(matches!(err, GateError::InvalidBounds { .. }));
    }

    #[test]
    fn invalid_bounds_are_refused() {
        let err = Normalizer::new(
            NormalizerConfig::default().with_field("drawdown", FieldBounds::new(1.0, -1.0)),
        )
        .unwrap_err();
        assert!(matches!(err, GateError::InvalidBounds { .. }));
    }

    #[test]
    fn normalization_is_deterministic() {
        let n = normalizer();
        let input = raw().with_field("volatility", 1.3).with_field("drawdown", -0.4);
        let a = n.normalize(&input, &gated("SP500")).unwrap();
        let b = n.normalize(&input, &gated("SP500")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn window_aborts_on_first_rejection() {
        let n = normalizer();
        let raws = vec![
            raw().with_field("drawdown", 0.1),
            raw().with_field("drawdown", 3.0),
        ];
        assert!(n.normalize_window(&raws, &gated("SP500")).is_err());
        let ok = n.normalize_window(&raws[..1], &gated("SP500")).unwrap();
        assert_eq!(ok.len(), 1);
    }
}
