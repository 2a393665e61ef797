//! Configuration for ability aggregation.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::Action;
use crate::rule::Rule;

/// Attribute holding the owning tenant id unless configured otherwise.
pub const DEFAULT_TENANT_ATTRIBUTE: &str = "tenantId";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AbilityConfigError {
    #[error("`{0}` must not be empty")]
    EmptyValue(&'static str),

    #[error("tier `{0}` is configured more than once")]
    DuplicateTier(String),

    #[error("tier `{tier}` has a grant without {missing}")]
    EmptyGrant { tier: String, missing: &'static str },
}

/// Rule aggregation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AbilityConfig {
    /// Platform role that receives `manage all`.
    pub admin_role: String,

    /// Resource attribute holding the owning tenant id.
    pub tenant_attribute: String,

    /// Per-tenant role tiers.
    pub tiers: Vec<TierConfig>,

    /// Rules appended for every principal, administrators included.
    pub protected_rules: Vec<Rule>,

    /// Extra coarse actions, alias -> members.
    pub action_aliases: BTreeMap<String, Vec<Action>>,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self {
            admin_role: "admin".to_owned(),
            tenant_attribute: DEFAULT_TENANT_ATTRIBUTE.to_owned(),
            tiers: vec![TierConfig::owner(), TierConfig::member()],
            protected_rules: vec![
                Rule::deny(Action::Update, "AuditLog"),
                Rule::deny(Action::Delete, "AuditLog"),
            ],
            action_aliases: BTreeMap::new(),
        }
    }
}

impl AbilityConfig {
    /// Check the configuration for consistency.
    ///
    /// # Errors
    ///
    /// Returns an error for empty role or attribute names, duplicate tiers,
    /// or grants without subjects or actions.
    pub fn validate(&self) -> Result<(), AbilityConfigError> {
        if self.admin_role.trim().is_empty() {
            return Err(AbilityConfigError::EmptyValue("admin_role"));
        }
        if self.tenant_attribute.trim().is_empty() {
            return Err(AbilityConfigError::EmptyValue("tenant_attribute"));
        }

        let mut seen = BTreeSet::new();
        for tier in &self.tiers {
            if tier.role.trim().is_empty() {
                return Err(AbilityConfigError::EmptyValue("tiers[].role"));
            }
            if !seen.insert(tier.role.as_str()) {
                return Err(AbilityConfigError::DuplicateTier(tier.role.clone()));
            }
            for grant in &tier.grants {
                if grant.subjects.is_empty() {
                    return Err(AbilityConfigError::EmptyGrant {
                        tier: tier.role.clone(),
                        missing: "subjects",
                    });
                }
                if grant.actions.is_empty() {
                    return Err(AbilityConfigError::EmptyGrant {
                        tier: tier.role.clone(),
                        missing: "actions",
                    });
                }
            }
        }
        Ok(())
    }
}

/// Rules granted by one role-in-tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    pub role: String,
    #[serde(default)]
    pub grants: Vec<Grant>,
}

impl TierConfig {
    /// Owner tier: manages everything inside its tenant and reaches the
    /// tenant-shared subjects without tenant scoping.
    #[must_use]
    pub fn owner() -> Self {
        Self {
            role: "owner".to_owned(),
            grants: vec![
                Grant::scoped(
                    [
                        "Workspace",
                        "Mailbox",
                        "Domain",
                        "Member",
                        "Invoice",
                        "Subscription",
                        "Ticket",
                        "Doc",
                    ],
                    [Action::Manage],
                ),
                Grant::shared(["SharedMailbox"], [Action::Read, Action::Create]),
            ],
        }
    }

    /// Member tier: read and create inside its tenant, no billing or
    /// membership administration.
    #[must_use]
    pub fn member() -> Self {
        Self {
            role: "member".to_owned(),
            grants: vec![
                Grant::scoped(["Workspace", "Mailbox", "Ticket", "Doc"], [Action::Read]),
                Grant::scoped(["Ticket", "Doc"], [Action::Create]),
            ],
        }
    }
}

/// Actions allowed on subjects, optionally scoped to the membership's tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Grant {
    pub subjects: Vec<String>,
    pub actions: Vec<Action>,
    #[serde(default = "default_tenant_scoped")]
    pub tenant_scoped: bool,
}

fn default_tenant_scoped() -> bool {
    true
}

impl Grant {
    #[must_use]
    pub fn scoped<S, A>(subjects: S, actions: A) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        A: IntoIterator<Item = Action>,
    {
        Self {
            subjects: subjects.into_iter().map(Into::into).collect(),
            actions: actions.into_iter().collect(),
            tenant_scoped: true,
        }
    }

    #[must_use]
    pub fn shared<S, A>(subjects: S, actions: A) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        A: IntoIterator<Item = Action>,
    {
        Self {
            tenant_scoped: false,
            ..Self::scoped(subjects, actions)
        }
    }
}
