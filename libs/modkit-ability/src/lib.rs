#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Attribute-based permission sets for multi-tenant services.
//!
//! An [`Ability`] is built per request by the [`AbilityAggregator`] from the
//! principal's platform roles and tenant memberships, then queried with
//! [`Ability::can`].

pub mod ability;
pub mod action;
pub mod aggregator;
pub mod condition;
pub mod config;
pub mod contributors;
pub mod principal;
pub mod resource;
pub mod rule;

pub use ability::Ability;
pub use action::{Action, ActionResolver};
pub use aggregator::AbilityAggregator;
pub use condition::{Attributes, Condition, ConditionError, Operator};
pub use config::{
    AbilityConfig, AbilityConfigError, DEFAULT_TENANT_ATTRIBUTE, Grant, TierConfig,
};
pub use contributors::{RuleContributor, TierContributor};
pub use principal::{Principal, RoleTag, TenantMembership};
pub use resource::{ALL_SUBJECTS, Authorizable, Resource};
pub use rule::{Effect, Rule};
