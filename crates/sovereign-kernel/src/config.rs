use std::path::Path;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use sovereign_audit::signing_key_from_hex;
use sovereign_delegation::DelegationError;
use sovereign_gate::{Canonicalizer, Normalizer, NormalizerConfig};
use sovereign_guardian::{Guardian, GuardianConfig};
use sovereign_router::{RegimeRouter, RouterConfig};
use sovereign_types::{AuthorityId, GrantCondition, GrantScope, Identity, Phase};

use crate::error::ConfigError;

/// Logging options for the tracing subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// A grant issued at startup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelegationSpec {
    pub holder: AuthorityId,
    pub phases: Vec<Phase>,
    /// External identifiers the grant is limited to; all scopes when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    #[serde(default)]
    pub condition: GrantCondition,
}

/// Complete configuration of one governance run.
///
/// Loaded once at startup and never changed afterwards. Every section is
/// optional in a file; omitted ones keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub alpha: AuthorityId,
    /// Hex 32-byte Ed25519 seed Alpha signs decisions with. A fresh key is
    /// generated per run when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_signing_key: Option<String>,
    pub identities: Vec<Identity>,
    pub normalizer: NormalizerConfig,
    pub router: RouterConfig,
    pub guardian: GuardianConfig,
    pub delegations: Vec<DelegationSpec>,
    /// Bounded wait for the identity table at ingress.
    pub ingest_timeout_ms: u64,
    pub log: LogConfig,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            alpha: AuthorityId::alpha(),
            alpha_signing_key: None,
            identities: Vec::new(),
            normalizer: NormalizerConfig::default(),
            router: RouterConfig::default(),
            guardian: GuardianConfig::default(),
            delegations: Vec::new(),
            ingest_timeout_ms: 2_000,
            log: LogConfig::default(),
        }
    }
}

impl GovernanceConfig {
    /// Load defaults, then the optional file, then `SOVEREIGN_*` environment
    /// overrides (`__` separates nested keys), and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_from(
            path,
            config::Environment::with_prefix("SOVEREIGN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    pub(crate) fn load_from(
        path: Option<&Path>,
        environment: config::Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&GovernanceConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(environment);

        let config: GovernanceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn ingest_timeout(&self) -> Duration {
        Duration::from_millis(self.ingest_timeout_ms)
    }

    /// Check every component can be built from this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.alpha.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid("alpha authority id is empty".into()));
        }
        if self.ingest_timeout_ms == 0 {
            return Err(ConfigError::Invalid("ingest_timeout_ms must be positive".into()));
        }
        self.signing_key()?;

        let canonicalizer = self.canonicalizer()?;
        self.normalizer()?;
        self.regime_router()?;
        self.guardian()?;
        for index in 0..self.delegations.len() {
            self.grant_scope(index, &canonicalizer)?;
        }
        Ok(())
    }

    /// The configured Alpha signing key, if any.
    pub(crate) fn signing_key(&self) -> Result<Option<SigningKey>, ConfigError> {
        self.alpha_signing_key
            .as_deref()
            .map(|seed| {
                signing_key_from_hex(seed)
                    .map_err(|e| ConfigError::Invalid(format!("alpha_signing_key: {e}")))
            })
            .transpose()
    }

    pub(crate) fn canonicalizer(&self) -> Result<Canonicalizer, ConfigError> {
        Ok(Canonicalizer::new(self.identities.iter().cloned())?)
    }

    pub(crate) fn normalizer(&self) -> Result<Normalizer, ConfigError> {
        Ok(Normalizer::new(self.normalizer.clone())?)
    }

    pub(crate) fn regime_router(&self) -> Result<RegimeRouter, ConfigError> {
        Ok(RegimeRouter::new(self.router.clone())?)
    }

    pub(crate) fn guardian(&self) -> Result<Guardian, ConfigError> {
        Ok(Guardian::new(self.guardian.clone())?)
    }

    /// Validated grant scope of delegation `index`.
    pub(crate) fn grant_scope(
        &self,
        index: usize,
        canonicalizer: &Canonicalizer,
    ) -> Result<GrantScope, ConfigError> {
        let invalid = |source| ConfigError::Delegation { index, source };
        let spec = self
            .delegations
            .get(index)
            .ok_or_else(|| ConfigError::Invalid(format!("no delegation at index {index}")))?;

        if spec.holder == self.alpha {
            return Err(invalid(DelegationError::AlphaHolder));
        }
        let scope = GrantScope::phases(spec.phases.iter().copied());
        if scope.phases.is_empty() {
            return Err(invalid(DelegationError::EmptyScope));
        }
        if let Some(phase) = scope.non_delegable_phase() {
            return Err(invalid(DelegationError::NonDelegablePhase(phase)));
        }

        match &spec.scopes {
            Some(identifiers) => {
                let keys = identifiers
                    .iter()
                    .map(|id| canonicalizer.resolve(id).map(|k| k.into_key()))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| ConfigError::Invalid(format!("delegation {index}: {e}")))?;
                Ok(scope.restricted_to(keys))
            }
            None => Ok(scope),
        }
    }
}
