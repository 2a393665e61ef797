//! Axum middleware and extractors for the request guard

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderName, Method, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use modkit_ability::{Ability, Principal};

use crate::{
    authn::Credential,
    config::GuardConfig,
    config_error::ConfigError,
    errors::AuthzError,
    guard::{AccessRequest, AuthorizedRequest, Guard},
    types::RoutePolicy,
};

/// Extractor for the guard's outcome - validates that the middleware has run
#[derive(Debug, Clone)]
pub struct Authorized(pub AuthorizedRequest);

impl<S> FromRequestParts<S> for Authorized
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthorizedRequest>()
            .cloned()
            .map(Authorized)
            .ok_or_else(|| {
                tracing::error!("AuthorizedRequest not found - guard middleware not configured");
                AuthzError::MisconfiguredRoute
            })
    }
}

/// Extractor for the authenticated principal; rejects anonymous requests
#[derive(Debug, Clone)]
pub struct CurrentPrincipal(pub Arc<Principal>);

impl<S> FromRequestParts<S> for CurrentPrincipal
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authorized(request) = Authorized::from_request_parts(parts, state).await?;
        request
            .principal
            .map(CurrentPrincipal)
            .ok_or(AuthzError::CredentialMissing)
    }
}

/// Extractor for the ability built by the policy guard
///
/// Only available on routes that declare policy predicates.
#[derive(Debug, Clone)]
pub struct CurrentAbility(pub Arc<Ability>);

impl<S> FromRequestParts<S> for CurrentAbility
where
    S: Send + Sync,
{
    type Rejection = AuthzError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Authorized(request) = Authorized::from_request_parts(parts, state).await?;
        request.ability.map(CurrentAbility).ok_or_else(|| {
            tracing::error!("no ability on request - route declares no policy predicates");
            AuthzError::MisconfiguredRoute
        })
    }
}

#[derive(Clone)]
pub struct GuardState {
    guard: Guard,
    policy: Arc<dyn RoutePolicy>,
    header: HeaderName,
    scheme: String,
}

impl GuardState {
    /// State reading `Authorization: Bearer <token>`.
    #[must_use]
    pub fn new(guard: Guard, policy: Arc<dyn RoutePolicy>) -> Self {
        Self {
            guard,
            policy,
            header: axum::http::header::AUTHORIZATION,
            scheme: "Bearer".to_owned(),
        }
    }

    /// Build the guard and credential extraction settings from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn from_config(
        config: &GuardConfig,
        policy: Arc<dyn RoutePolicy>,
    ) -> Result<Self, ConfigError> {
        let guard = config.build_guard()?;
        Self::new(guard, policy)
            .with_credential_header(&config.credential_header, config.credential_scheme.as_str())
            .map_err(|_| ConfigError::InvalidHeader(config.credential_header.clone()))
    }

    /// Read the credential from `header`, stripping `scheme` when non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if `header` is not a valid header name.
    pub fn with_credential_header(
        mut self,
        header: &str,
        scheme: impl Into<String>,
    ) -> Result<Self, axum::http::header::InvalidHeaderName> {
        self.header = HeaderName::try_from(header)?;
        self.scheme = scheme.into();
        Ok(self)
    }
}

/// Guard middleware for `axum::middleware::from_fn_with_state`
///
/// Skips CORS preflight requests, resolves the route's metadata and runs
/// [`Guard::authenticate_and_authorize`]. On success the
/// [`AuthorizedRequest`] is inserted into the request extensions.
pub async fn guard_middleware(
    State(state): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_preflight_request(request.method(), request.headers()) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let route = state.policy.resolve(&method, &path).await;

    let credential = extract_credential(request.headers(), &state.header, &state.scheme);
    let access = AccessRequest::new(credential, &route).with_path(&path);

    match state.guard.authenticate_and_authorize(&access).await {
        Ok(authorized) => {
            request.extensions_mut().insert(authorized);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Extract the credential from `header`, stripping `scheme` if configured
///
/// A header that is present but unreadable is `Malformed`, never `Absent`.
fn extract_credential<'a>(
    headers: &'a HeaderMap,
    header: &HeaderName,
    scheme: &str,
) -> Credential<'a> {
    let Some(value) = headers.get(header) else {
        return Credential::Absent;
    };
    let Ok(value) = value.to_str() else {
        return Credential::Malformed;
    };

    let value = value.trim();
    let token = if scheme.is_empty() {
        value
    } else {
        match value.split_once(' ') {
            Some((prefix, rest)) if prefix.eq_ignore_ascii_case(scheme) => rest.trim(),
            _ => return Credential::Malformed,
        }
    };

    if token.is_empty() {
        Credential::Malformed
    } else {
        Credential::Token(token)
    }
}

/// Check if this is a CORS preflight request
fn is_preflight_request(method: &Method, headers: &HeaderMap) -> bool {
    method == Method::OPTIONS
        && headers.contains_key(axum::http::header::ORIGIN)
        && headers.contains_key(axum::http::header::ACCESS_CONTROL_REQUEST_METHOD)
}
