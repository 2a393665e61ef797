//! Authentication followed by policy checks, in one call.

use std::sync::Arc;

use modkit_ability::{Ability, AbilityAggregator, Principal};

use crate::authn::{AuthenticationGuard, Credential};
use crate::errors::AuthzError;
use crate::policy::{DenyReason, PolicyGuard, PolicyState};
use crate::traits::{CredentialResolver, MembershipLoader};
use crate::types::RouteMeta;

/// What the guard needs to know about an incoming request.
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub credential: Credential<'a>,
    pub route: &'a RouteMeta,
    /// Used for audit logs only.
    pub path: &'a str,
}

impl<'a> AccessRequest<'a> {
    #[must_use]
    pub fn new(credential: Credential<'a>, route: &'a RouteMeta) -> Self {
        Self {
            credential,
            route,
            path: "",
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: &'a str) -> Self {
        self.path = path;
        self
    }
}

/// Request context after a successful check.
#[derive(Debug, Clone, Default)]
pub struct AuthorizedRequest {
    /// `None` for anonymous access to a public route.
    pub principal: Option<Arc<Principal>>,
    /// Present when the route declared policy predicates.
    pub ability: Option<Arc<Ability>>,
}

impl AuthorizedRequest {
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.principal.is_none()
    }
}

/// Request guard: credential check, static role gate, then policies.
#[derive(Clone)]
pub struct Guard {
    authn: AuthenticationGuard,
    policy: PolicyGuard,
}

impl Guard {
    #[must_use]
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        memberships: Arc<dyn MembershipLoader>,
        aggregator: Arc<AbilityAggregator>,
    ) -> Self {
        Self {
            authn: AuthenticationGuard::new(credentials),
            policy: PolicyGuard::new(memberships, aggregator),
        }
    }

    /// Authenticate the request and evaluate its route's policies.
    ///
    /// # Errors
    ///
    /// Any [`AuthzError`]; see the variant docs for the mapping.
    #[tracing::instrument(
        name = "authz.guard",
        skip_all,
        fields(path = %request.path, public = request.route.is_public)
    )]
    pub async fn authenticate_and_authorize(
        &self,
        request: &AccessRequest<'_>,
    ) -> Result<AuthorizedRequest, AuthzError> {
        let route = request.route;
        let principal = self.authn.authenticate(request.credential, route).await?;

        match self
            .policy
            .check(principal.as_ref(), &route.policy_predicates)
            .await?
        {
            PolicyState::Authorized { ability } => {
                tracing::debug!(
                    principal_id = principal.as_ref().map(Principal::id),
                    "request authorized"
                );
                Ok(AuthorizedRequest {
                    principal: principal.map(Arc::new),
                    ability,
                })
            }
            PolicyState::Denied(DenyReason::NoPrincipal) => {
                tracing::error!(
                    path = %request.path,
                    predicates = route.policy_predicates.len(),
                    "route declares policies but is reachable without a principal"
                );
                Err(AuthzError::MisconfiguredRoute)
            }
            PolicyState::Denied(DenyReason::PredicateFailed { label }) => {
                tracing::warn!(
                    principal_id = principal.as_ref().map(Principal::id),
                    path = %request.path,
                    policy = %label,
                    "policy denied access"
                );
                Err(AuthzError::PolicyDenied { policy: label })
            }
        }
    }
}
