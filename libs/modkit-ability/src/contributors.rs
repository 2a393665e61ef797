//! Rule contributors.
//!
//! Contributors are pure: they read a principal and one of its memberships
//! and return rules. The aggregator concatenates their output.

use crate::action::Action;
use crate::condition::Condition;
use crate::config::{Grant, TierConfig};
use crate::principal::{Principal, TenantMembership};
use crate::resource::ALL_SUBJECTS;
use crate::rule::Rule;

/// Produces the rules one role-in-tenant grants.
pub trait RuleContributor: Send + Sync {
    fn contribute(&self, principal: &Principal, membership: &TenantMembership) -> Vec<Rule>;
}

/// Condition restricting a rule to resources owned by `tenant_id`.
#[must_use]
pub fn tenant_scope(tenant_attribute: &str, tenant_id: &str) -> Condition {
    Condition::field_eq(tenant_attribute, tenant_id)
}

/// `manage all` for holders of the administrator role, nothing otherwise.
#[must_use]
pub fn admin_rules(principal: &Principal, admin_role: &str) -> Vec<Rule> {
    if principal.has_role(admin_role) {
        vec![Rule::allow(Action::Manage, ALL_SUBJECTS)]
    } else {
        Vec::new()
    }
}

/// Persisted overrides of a membership; rules stored without a condition
/// are scoped to the membership's tenant.
#[must_use]
pub fn custom_rules(membership: &TenantMembership, tenant_attribute: &str) -> Vec<Rule> {
    membership
        .custom_rules
        .iter()
        .map(|rule| {
            if rule.is_conditional() {
                rule.clone()
            } else {
                rule.clone()
                    .with_condition(tenant_scope(tenant_attribute, &membership.tenant_id))
            }
        })
        .collect()
}

/// Data-driven tier built from a [`TierConfig`].
#[derive(Debug, Clone)]
pub struct TierContributor {
    grants: Vec<Grant>,
    tenant_attribute: String,
}

impl TierContributor {
    #[must_use]
    pub fn new(tier: &TierConfig, tenant_attribute: impl Into<String>) -> Self {
        Self {
            grants: tier.grants.clone(),
            tenant_attribute: tenant_attribute.into(),
        }
    }
}

impl RuleContributor for TierContributor {
    fn contribute(&self, _principal: &Principal, membership: &TenantMembership) -> Vec<Rule> {
        let mut rules = Vec::new();
        for grant in &self.grants {
            let scope = grant
                .tenant_scoped
                .then(|| tenant_scope(&self.tenant_attribute, &membership.tenant_id));
            for subject in &grant.subjects {
                for action in &grant.actions {
                    let rule = Rule::allow(action.clone(), subject.as_str());
                    rules.push(match &scope {
                        Some(scope) => rule.with_condition(scope.clone()),
                        None => rule,
                    });
                }
            }
        }
        rules
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::resource::Resource;

    fn owner_of(tenant: &str) -> (Principal, TenantMembership) {
        let membership = TenantMembership::new(tenant, "owner");
        (Principal::new("u1").with_membership(membership.clone()), membership)
    }

    #[test]
    fn admin_rules_need_the_role() {
        assert!(admin_rules(&Principal::new("u1"), "admin").is_empty());
        let rules = admin_rules(&Principal::new("u1").with_role("admin"), "admin");
        assert_eq!(rules, vec![Rule::allow(Action::Manage, ALL_SUBJECTS)]);
    }

    #[test]
    fn owner_tier_scopes_owned_subjects_and_shares_the_rest() {
        let (principal, membership) = owner_of("t1");
        let rules = TierContributor::new(&TierConfig::owner(), "tenantId")
            .contribute(&principal, &membership);

        let doc = rules
            .iter()
            .find(|r| r.subject_type() == "Doc")
            .unwrap();
        assert_eq!(doc.action(), &Action::Manage);
        assert!(doc.matches_resource(&Resource::new("Doc").with("tenantId", "t1")));
        assert!(!doc.matches_resource(&Resource::new("Doc").with("tenantId", "t2")));

        let shared: Vec<_> = rules
            .iter()
            .filter(|r| r.subject_type() == "SharedMailbox")
            .collect();
        assert_eq!(shared.len(), 2);
        assert!(shared.iter().all(|r| !r.is_conditional()));
    }

    #[test]
    fn member_tier_omits_billing() {
        let membership = TenantMembership::new("t1", "member");
        let rules = TierContributor::new(&TierConfig::member(), "tenantId")
            .contribute(&Principal::new("u1"), &membership);
        assert!(rules.iter().all(|r| r.subject_type() != "Invoice"));
        assert!(rules.iter().all(Rule::is_conditional));
        assert!(rules.iter().all(|r| r.action() != &Action::Manage));
    }

    #[test]
    fn custom_rules_default_to_tenant_scope() {
        let explicit = Rule::allow(Action::Read, "Invoice")
            .with_condition(Condition::field_eq("status", "paid"));
        let membership = TenantMembership::new("t1", "owner")
            .with_custom_rule(Rule::allow(Action::custom("Export"), "Doc"))
            .with_custom_rule(explicit.clone());

        let rules = custom_rules(&membership, "tenantId");
        assert_eq!(
            rules[0].condition(),
            Some(&Condition::field_eq("tenantId", "t1"))
        );
        assert_eq!(rules[1], explicit);
    }
}
