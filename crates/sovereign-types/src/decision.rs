use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authority::AuthorityId;
use crate::enforcement::{EnforcementAction, PredicateKind};
use crate::identity::CanonicalKey;
use crate::regime::{ActionDescriptor, Proposer, RegimeBand};

/// Why Alpha denied instead of routing or enforcing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenyReason {
    /// A required input failed canonicalization or normalization.
    UngatedInput,
    /// No proposal Alpha could ratify was available.
    NoValidProposal,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::UngatedInput => "ungated-input",
            DenyReason::NoValidProposal => "no-valid-proposal",
        }
    }
}

/// The chosen action of a decision.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DecisionAction {
    /// A ratified routing proposal.
    Route { action: ActionDescriptor },
    /// A Guardian enforcement action.
    Enforce { action: EnforcementAction },
    Deny { reason: DenyReason },
}

impl DecisionAction {
    /// Short action label: the route kind, the enforcement action, or `deny`.
    pub fn label(&self) -> &str {
        match self {
            DecisionAction::Route { action } => &action.kind,
            DecisionAction::Enforce { action } => action.as_str(),
            DecisionAction::Deny { .. } => "deny",
        }
    }

    pub fn enforcement(&self) -> Option<EnforcementAction> {
        match self {
            DecisionAction::Enforce { action } => Some(*action),
            _ => None,
        }
    }
}

/// What a decision resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DecisionSource {
    Proposal {
        regime: String,
        band: RegimeBand,
        proposer: Proposer,
    },
    Breach {
        predicate: PredicateKind,
        firings: usize,
    },
    /// Upstream gating failed for the named inputs.
    Gate { rejected: Vec<String> },
    /// Nothing to ratify.
    Absent,
}

/// Alpha's Ed25519 signature over a ruling, hex encoded.
///
/// The signed message binds the issuer, scope, action and source, so a
/// signature cannot be moved onto a different ruling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaSignature {
    /// 64-byte Ed25519 signature.
    pub signature: String,
    /// 32-byte verifying key of the signer.
    pub public_key: String,
    /// Short BLAKE3 fingerprint of `public_key`, for logs and audit readers.
    pub key_fingerprint: String,
}

/// Alpha's resolution for one cycle, before it is sealed into the audit trace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ruling {
    scope: CanonicalKey,
    action: DecisionAction,
    source: DecisionSource,
    issuer: AuthorityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<AlphaSignature>,
}

impl Ruling {
    pub fn new(
        scope: CanonicalKey,
        action: DecisionAction,
        source: DecisionSource,
        issuer: AuthorityId,
    ) -> Self {
        Self {
            scope,
            action,
            source,
            issuer,
            signature: None,
        }
    }

    /// Attach a signature. Replaces any earlier one.
    pub fn with_signature(mut self, signature: AlphaSignature) -> Self {
        self.signature = Some(signature);
        self
    }

    pub fn scope(&self) -> &CanonicalKey {
        &self.scope
    }

    pub fn action(&self) -> &DecisionAction {
        &self.action
    }

    pub fn source(&self) -> &DecisionSource {
        &self.source
    }

    pub fn issuer(&self) -> &AuthorityId {
        &self.issuer
    }

    pub fn signature(&self) -> Option<&AlphaSignature> {
        self.signature.as_ref()
    }

    /// Seal the ruling into a binding decision.
    ///
    /// Only the audit trace calls this, under its write lock, so the
    /// sequence number is the decision's audit sequence.
    pub fn seal(self, sequence: u64, timestamp: DateTime<Utc>) -> Decision {
        Decision {
            sequence,
            scope: self.scope,
            action: self.action,
            source: self.source,
            issuer: self.issuer,
            timestamp,
            signature: self.signature,
        }
    }
}

/// The single binding artifact of a decision cycle.
///
/// Immutable: no setters, and once appended to the audit trace it is covered
/// by the hash chain.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    sequence: u64,
    scope: CanonicalKey,
    action: DecisionAction,
    source: DecisionSource,
    issuer: AuthorityId,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<AlphaSignature>,
}

impl Decision {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn scope(&self) -> &CanonicalKey {
        &self.scope
    }

    pub fn action(&self) -> &DecisionAction {
        &self.action
    }

    pub fn source(&self) -> &DecisionSource {
        &self.source
    }

    pub fn issuer(&self) -> &AuthorityId {
        &self.issuer
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Alpha's signature over the ruling this decision was sealed from.
    pub fn signature(&self) -> Option<&AlphaSignature> {
        self.signature.as_ref()
    }

    pub fn key_fingerprint(&self) -> Option<&str> {
        self.signature.as_ref().map(|s| s.key_fingerprint.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        let route = DecisionAction::Route {
            action: ActionDescriptor::new("reduce"),
        };
        let enforce = DecisionAction::Enforce {
            action: EnforcementAction::Freeze,
        };
        let deny = DecisionAction::Deny {
            reason: DenyReason::UngatedInput,
        };
        assert_eq!(route.label(), "reduce");
        assert_eq!(enforce.label(), "freeze");
        assert_eq!(deny.label(), "deny");
        assert_eq!(enforce.enforcement(), Some(EnforcementAction::Freeze));
    }

    #[test]
    fn seal_keeps_ruling_content() {
        let ruling = Ruling::new(
            CanonicalKey::new("SP500"),
            DecisionAction::Deny {
                reason: DenyReason::NoValidProposal,
            },
            DecisionSource::Absent,
            AuthorityId::alpha(),
        );
        let now = Utc::now();
        let decision = ruling.clone().seal(7, now);

        assert_eq!(decision.sequence(), 7);
        assert_eq!(decision.scope(), ruling.scope());
        assert_eq!(decision.issuer(), &AuthorityId::alpha());
        assert_eq!(decision.timestamp(), now);
        assert!(decision.signature().is_none());
    }

    #[test]
    fn seal_carries_signature() {
        let signature = AlphaSignature {
            signature: "ab".repeat(64),
            public_key: "cd".repeat(32),
            key_fingerprint: "0123456789abcdef".into(),
        };
        let ruling = Ruling::new(
            CanonicalKey::new("SP500"),
            DecisionAction::Deny {
                reason: DenyReason::UngatedInput,
            },
            DecisionSource::Absent,
            AuthorityId::alpha(),
        )
        .with_signature(signature.clone());
        let decision = ruling.seal(1, Utc::now());

        assert_eq!(decision.signature(), Some(&signature));
        assert_eq!(decision.key_fingerprint(), Some("0123456789abcdef"));
    }
}
