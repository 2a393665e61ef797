//! Credential verification and the static role gate.

use std::sync::Arc;

use modkit_ability::Principal;

use crate::errors::AuthzError;
use crate::traits::{CredentialError, CredentialResolver};
use crate::types::RouteMeta;

/// Credential as presented on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    /// Nothing was presented.
    Absent,
    /// Something was presented but could not be read as a credential
    /// (wrong scheme, missing token, non-UTF-8 value).
    Malformed,
    /// Raw token with any scheme prefix stripped.
    Token(&'a str),
}

impl<'a> From<Option<&'a str>> for Credential<'a> {
    fn from(token: Option<&'a str>) -> Self {
        token.map_or(Credential::Absent, Credential::Token)
    }
}

/// Authenticates a request against a route's public flag and role allow-list.
#[derive(Clone)]
pub struct AuthenticationGuard {
    resolver: Arc<dyn CredentialResolver>,
}

impl AuthenticationGuard {
    #[must_use]
    pub fn new(resolver: Arc<dyn CredentialResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve the principal for `credential` and enforce `route.static_roles`.
    ///
    /// Returns `Ok(None)` for anonymous access to a public route. A missing,
    /// malformed or rejected credential on a public route is anonymous.
    ///
    /// # Errors
    ///
    /// - `CredentialMissing` / `CredentialInvalid` on protected routes
    /// - `InsufficientRole` when the allow-list is not satisfied
    /// - `Infrastructure` when the credential provider is unavailable
    pub async fn authenticate(
        &self,
        credential: Credential<'_>,
        route: &RouteMeta,
    ) -> Result<Option<Principal>, AuthzError> {
        let principal = if route.is_public {
            self.resolve_optional(credential).await?
        } else {
            Some(self.resolve_required(credential).await?)
        };

        if let Some(required) = &route.static_roles {
            check_roles(principal.as_ref(), required)?;
        }

        Ok(principal)
    }

    async fn resolve_required(&self, credential: Credential<'_>) -> Result<Principal, AuthzError> {
        let token = match credential {
            Credential::Token(token) => token,
            Credential::Absent => return Err(AuthzError::CredentialMissing),
            Credential::Malformed => {
                tracing::warn!("malformed credential");
                return Err(AuthzError::CredentialInvalid(
                    "malformed credential".to_owned(),
                ));
            }
        };

        match self.resolver.resolve(token).await {
            Ok(principal) => Ok(principal),
            Err(CredentialError::Unavailable(reason)) => Err(provider_unavailable(reason)),
            Err(err) => {
                tracing::warn!(error = %err, "credential rejected");
                Err(err.into())
            }
        }
    }

    async fn resolve_optional(
        &self,
        credential: Credential<'_>,
    ) -> Result<Option<Principal>, AuthzError> {
        let Credential::Token(token) = credential else {
            return Ok(None);
        };

        match self.resolver.resolve(token).await {
            Ok(principal) => Ok(Some(principal)),
            Err(CredentialError::Unavailable(reason)) => Err(provider_unavailable(reason)),
            Err(err) => {
                tracing::debug!(error = %err, "public route: continuing anonymously");
                Ok(None)
            }
        }
    }
}

fn provider_unavailable(reason: String) -> AuthzError {
    tracing::error!(%reason, "credential provider unavailable");
    AuthzError::Infrastructure(reason)
}

fn check_roles(principal: Option<&Principal>, required: &[String]) -> Result<(), AuthzError> {
    let allowed = principal.is_some_and(|p| p.has_any_role(required));
    if allowed {
        return Ok(());
    }

    tracing::warn!(
        principal_id = principal.map(Principal::id),
        required_roles = ?required,
        "static role check failed"
    );
    Err(AuthzError::InsufficientRole {
        required: required.to_vec(),
    })
}
