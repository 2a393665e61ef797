#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Request guard for multi-tenant services.
//!
//! A [`Guard`] authenticates the presented credential, enforces the route's
//! static role allow-list and then evaluates its policy predicates against an
//! [`modkit_ability::Ability`] built for the principal.

pub mod authn;
pub mod config;
pub mod config_error;
pub mod errors;
pub mod guard;
pub mod policy;
pub mod providers;
pub mod traits;
pub mod types;

#[cfg(feature = "axum-ext")]
pub mod axum_ext;

pub use authn::{AuthenticationGuard, Credential};
pub use config::{GuardConfig, JwtConfig};
pub use config_error::ConfigError;
pub use errors::AuthzError;
pub use guard::{AccessRequest, AuthorizedRequest, Guard};
pub use policy::{DenyReason, PolicyGuard, PolicyState};
pub use providers::{JwtCredentialResolver, StaticCredentialResolver, StaticMembershipLoader};
pub use traits::{CredentialError, CredentialResolver, MembershipError, MembershipLoader};
pub use types::{PolicyPredicate, RouteMeta, RoutePolicy, RouteTable};

#[cfg(feature = "axum-ext")]
pub use axum_ext::{Authorized, CurrentAbility, CurrentPrincipal, GuardState, guard_middleware};
