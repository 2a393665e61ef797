//! Dynamic policy checks over the request's ability.

use std::sync::Arc;

use modkit_ability::{Ability, AbilityAggregator, Principal};

use crate::errors::AuthzError;
use crate::traits::MembershipLoader;
use crate::types::PolicyPredicate;

/// Why a policy check did not authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    /// Predicates are declared but authentication produced no principal.
    NoPrincipal,
    /// The labelled predicate evaluated to false.
    PredicateFailed { label: String },
}

/// Terminal state of a policy check. The check starts `Unchecked` and
/// always ends in one of these.
#[derive(Debug, Clone)]
pub enum PolicyState {
    /// `ability` is `None` when the route declares no predicates.
    Authorized { ability: Option<Arc<Ability>> },
    Denied(DenyReason),
}

impl PolicyState {
    #[must_use]
    pub fn is_authorized(&self) -> bool {
        matches!(self, PolicyState::Authorized { .. })
    }
}

/// Builds the ability for a principal and evaluates route predicates.
#[derive(Clone)]
pub struct PolicyGuard {
    memberships: Arc<dyn MembershipLoader>,
    aggregator: Arc<AbilityAggregator>,
}

impl PolicyGuard {
    #[must_use]
    pub fn new(memberships: Arc<dyn MembershipLoader>, aggregator: Arc<AbilityAggregator>) -> Self {
        Self {
            memberships,
            aggregator,
        }
    }

    /// Evaluate `predicates` for `principal`.
    ///
    /// No memberships are loaded and no ability is built when `predicates`
    /// is empty.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::Infrastructure` when memberships cannot be
    /// loaded. A denial is reported through [`PolicyState::Denied`].
    pub async fn check(
        &self,
        principal: Option<&Principal>,
        predicates: &[PolicyPredicate],
    ) -> Result<PolicyState, AuthzError> {
        if predicates.is_empty() {
            return Ok(PolicyState::Authorized { ability: None });
        }

        let Some(principal) = principal else {
            return Ok(PolicyState::Denied(DenyReason::NoPrincipal));
        };

        let memberships = self.memberships.load(principal.id()).await.map_err(|err| {
            tracing::error!(
                principal_id = principal.id(),
                error = %err,
                "membership lookup failed"
            );
            AuthzError::from(err)
        })?;

        let ability = self
            .aggregator
            .build(&principal.with_memberships(memberships));

        if let Some(failed) = predicates.iter().find(|p| !p.evaluate(&ability)) {
            return Ok(PolicyState::Denied(DenyReason::PredicateFailed {
                label: failed.label().to_owned(),
            }));
        }

        Ok(PolicyState::Authorized {
            ability: Some(Arc::new(ability)),
        })
    }
}
