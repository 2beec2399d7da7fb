use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovereign_types::{AuthorityId, DelegationContext, GrantCondition, GrantId, GrantScope};

/// A non-Alpha authority grant.
///
/// Fields are private: the ledger is the only owner, and the only mutation
/// is the one-way transition to revoked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorityGrant {
    id: GrantId,
    holder: AuthorityId,
    scope: GrantScope,
    condition: GrantCondition,
    created_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl AuthorityGrant {
    pub(crate) fn new(
        id: GrantId,
        holder: AuthorityId,
        scope: GrantScope,
        condition: GrantCondition,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            holder,
            scope,
            condition,
            created_at,
            revoked_at: None,
        }
    }

    pub(crate) fn mark_revoked(&mut self, at: DateTime<Utc>) {
        self.revoked_at.get_or_insert(at);
    }

    pub fn id(&self) -> GrantId {
        self.id
    }

    pub fn holder(&self) -> &AuthorityId {
        &self.holder
    }

    pub fn scope(&self) -> &GrantScope {
        &self.scope
    }

    pub fn condition(&self) -> &GrantCondition {
        &self.condition
    }

    /// Non-Alpha grants are always revocable.
    pub fn is_revocable(&self) -> bool {
        true
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        self.revoked_at
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Why this grant does not authorize `ctx`, or `None` when it does.
    pub fn invalidity(&self, ctx: &DelegationContext) -> Option<String> {
        if self.is_revoked() {
            return Some(format!("{} is revoked", self.id));
        }
        if ctx.at < self.created_at {
            return Some(format!("{} did not exist at {}", self.id, ctx.at));
        }
        if !self.scope.covers(ctx) {
            return Some(format!(
                "{} does not cover phase {} for {}",
                self.id, ctx.phase, ctx.scope
            ));
        }
        if !self.condition.holds(ctx) {
            return Some(format!("condition of {} does not hold", self.id));
        }
        None
    }

    pub fn is_valid(&self, ctx: &DelegationContext) -> bool {
        self.invalidity(ctx).is_none()
    }
}

/// Revocation history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Revocation {
    pub grant: GrantId,
    pub holder: AuthorityId,
    pub revoked_by: AuthorityId,
    pub revoked_at: DateTime<Utc>,
    pub reason: String,
}
