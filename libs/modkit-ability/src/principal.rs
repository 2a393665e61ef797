use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::rule::Rule;

/// Platform-level role tag such as `admin`.
pub type RoleTag = String;

/// Membership of a principal in one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantMembership {
    pub tenant_id: String,
    /// Tier inside the tenant, e.g. `owner` or `member`.
    pub role: String,
    /// Persisted per-tenant overrides, snapshotted when loaded.
    #[serde(default)]
    pub custom_rules: Vec<Rule>,
}

impl TenantMembership {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            role: role.into(),
            custom_rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_custom_rule(mut self, rule: Rule) -> Self {
        self.custom_rules.push(rule);
        self
    }
}

/// The authenticated actor.
///
/// The authorization code only reads principals. Attaching memberships
/// returns a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    id: String,
    #[serde(default)]
    roles: BTreeSet<RoleTag>,
    #[serde(default)]
    memberships: Vec<TenantMembership>,
}

impl Principal {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
            memberships: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<RoleTag>) -> Self {
        self.roles.insert(role.into());
        self
    }

    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RoleTag>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_membership(mut self, membership: TenantMembership) -> Self {
        self.memberships.push(membership);
        self
    }

    /// Snapshot of this principal with `memberships` replacing the current ones.
    #[must_use]
    pub fn with_memberships(&self, memberships: Vec<TenantMembership>) -> Self {
        Self {
            id: self.id.clone(),
            roles: self.roles.clone(),
            memberships,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeSet<RoleTag> {
        &self.roles
    }

    #[must_use]
    pub fn memberships(&self) -> &[TenantMembership] {
        &self.memberships
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True if the principal holds at least one of `required`.
    #[must_use]
    pub fn has_any_role<S>(&self, required: &[S]) -> bool
    where
        S: AsRef<str>,
    {
        required.iter().any(|role| self.roles.contains(role.as_ref()))
    }

    /// Membership for `tenant_id`, if any.
    #[must_use]
    pub fn membership(&self, tenant_id: &str) -> Option<&TenantMembership> {
        self.memberships.iter().find(|m| m.tenant_id == tenant_id)
    }
}
