//! Builds an [`Ability`] for a principal.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ability::Ability;
use crate::action::{Action, ActionResolver};
use crate::config::{AbilityConfig, AbilityConfigError};
use crate::contributors::{RuleContributor, TierContributor, admin_rules, custom_rules};
use crate::principal::Principal;
use crate::rule::Rule;

/// Merges administrator, protected, tier and custom rules.
///
/// `build` is deterministic for a given principal snapshot and performs no
/// I/O; memberships must already be attached to the principal.
#[derive(Clone)]
pub struct AbilityAggregator {
    admin_role: String,
    tenant_attribute: String,
    protected_rules: Vec<Rule>,
    contributors: BTreeMap<String, Arc<dyn RuleContributor>>,
    resolver: ActionResolver,
}

impl std::fmt::Debug for AbilityAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityAggregator")
            .field("admin_role", &self.admin_role)
            .field("tenant_attribute", &self.tenant_attribute)
            .field("protected_rules", &self.protected_rules)
            .field("tiers", &self.contributors.keys().collect::<Vec<_>>())
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl Default for AbilityAggregator {
    fn default() -> Self {
        Self::from_valid_config(&AbilityConfig::default())
    }
}

impl AbilityAggregator {
    /// Build an aggregator from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration fails validation.
    pub fn from_config(config: &AbilityConfig) -> Result<Self, AbilityConfigError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: &AbilityConfig) -> Self {
        let contributors = config
            .tiers
            .iter()
            .map(|tier| {
                let contributor: Arc<dyn RuleContributor> =
                    Arc::new(TierContributor::new(tier, config.tenant_attribute.as_str()));
                (tier.role.clone(), contributor)
            })
            .collect();

        let resolver = config
            .action_aliases
            .iter()
            .fold(ActionResolver::default(), |resolver, (alias, members)| {
                resolver.with_alias(Action::from(alias.as_str()), members.iter().cloned())
            });

        Self {
            admin_role: config.admin_role.clone(),
            tenant_attribute: config.tenant_attribute.clone(),
            protected_rules: config.protected_rules.clone(),
            contributors,
            resolver,
        }
    }

    /// Register or replace the contributor for a role-in-tenant.
    #[must_use]
    pub fn with_contributor(
        mut self,
        role: impl Into<String>,
        contributor: Arc<dyn RuleContributor>,
    ) -> Self {
        self.contributors.insert(role.into(), contributor);
        self
    }

    #[must_use]
    pub fn admin_role(&self) -> &str {
        &self.admin_role
    }

    #[must_use]
    pub fn build(&self, principal: &Principal) -> Ability {
        let mut rules = admin_rules(principal, &self.admin_role);
        rules.extend(self.protected_rules.iter().cloned());

        for membership in principal.memberships() {
            match self.contributors.get(&membership.role) {
                Some(contributor) => rules.extend(contributor.contribute(principal, membership)),
                None => tracing::debug!(
                    principal_id = principal.id(),
                    tenant_id = %membership.tenant_id,
                    role = %membership.role,
                    "no rule contributor for tenant role"
                ),
            }
            rules.extend(custom_rules(membership, &self.tenant_attribute));
        }

        tracing::trace!(
            principal_id = principal.id(),
            rule_count = rules.len(),
            "ability built"
        );

        Ability::with_resolver(rules, self.resolver.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::principal::TenantMembership;
    use crate::resource::Resource;

    struct FixedContributor(Vec<Rule>);

    impl RuleContributor for FixedContributor {
        fn contribute(&self, _principal: &Principal, _membership: &TenantMembership) -> Vec<Rule> {
            self.0.clone()
        }
    }

    fn doc(tenant: &str) -> Resource {
        Resource::new("Doc").with("tenantId", tenant)
    }

    #[test]
    fn principal_without_roles_gets_only_protected_rules() {
        let ability = AbilityAggregator::default().build(&Principal::new("u1"));
        assert!(ability.rules().iter().all(Rule::is_deny));
        assert!(ability.cannot(&Action::Read, &doc("t1")));
    }

    #[test]
    fn admin_manages_everything_except_protected_subjects() {
        let admin = Principal::new("root").with_role("admin");
        let ability = AbilityAggregator::default().build(&admin);
        assert!(ability.can(&Action::Manage, &doc("t9")));
        assert!(ability.can(&Action::Read, &Resource::new("Invoice")));
        assert!(ability.can(&Action::Read, &Resource::new("AuditLog")));
        assert!(ability.cannot(&Action::Delete, &Resource::new("AuditLog")));
    }

    #[test]
    fn unknown_tenant_role_contributes_nothing() {
        let principal = Principal::new("u1").with_membership(TenantMembership::new("t1", "guest"));
        let ability = AbilityAggregator::default().build(&principal);
        assert!(ability.cannot(&Action::Read, &doc("t1")));
    }

    #[test]
    fn custom_contributor_replaces_tier() {
        let aggregator = AbilityAggregator::default().with_contributor(
            "member",
            Arc::new(FixedContributor(vec![Rule::allow(Action::Update, "Doc")])),
        );
        let principal = Principal::new("u1").with_membership(TenantMembership::new("t1", "member"));
        let ability = aggregator.build(&principal);
        assert!(ability.can(&Action::Update, &doc("t2")));
        assert!(ability.cannot(&Action::Read, &doc("t1")));
    }

    #[test]
    fn configured_aliases_reach_the_ability() {
        let mut config = AbilityConfig::default();
        config
            .action_aliases
            .insert("review".to_owned(), vec![Action::Read, Action::Update]);
        config.tiers[1].grants[0].actions.push(Action::custom("review"));

        let aggregator = AbilityAggregator::from_config(&config).unwrap();
        let principal = Principal::new("u1").with_membership(TenantMembership::new("t1", "member"));
        let ability = aggregator.build(&principal);
        assert!(ability.can(&Action::Update, &doc("t1")));
        assert!(ability.cannot(&Action::Update, &doc("t2")));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = AbilityConfig {
            tenant_attribute: String::new(),
            ..AbilityConfig::default()
        };
        assert!(AbilityAggregator::from_config(&config).is_err());
    }

    #[test]
    fn build_is_deterministic() {
        let principal = Principal::new("u1")
            .with_role("admin")
            .with_membership(TenantMembership::new("t1", "owner"))
            .with_membership(TenantMembership::new("t2", "member"));
        let aggregator = AbilityAggregator::default();
        assert_eq!(aggregator.build(&principal).rules(), aggregator.build(&principal).rules());
    }
}
