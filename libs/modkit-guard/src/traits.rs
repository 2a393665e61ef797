use async_trait::async_trait;
use modkit_ability::{Principal, TenantMembership};
use thiserror::Error;

use crate::errors::AuthzError;

/// Why a presented credential did not yield a principal.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("malformed credential: {0}")]
    Malformed(String),

    #[error("credential expired")]
    Expired,

    #[error("credential rejected: {0}")]
    Rejected(String),

    /// The provider could not be reached; says nothing about the credential.
    #[error("credential provider unavailable: {0}")]
    Unavailable(String),
}

impl From<CredentialError> for AuthzError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Unavailable(reason) => AuthzError::Infrastructure(reason),
            other => AuthzError::CredentialInvalid(other.to_string()),
        }
    }
}

/// Failure to read memberships from the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("membership lookup failed for principal {principal_id}: {reason}")]
pub struct MembershipError {
    pub principal_id: String,
    pub reason: String,
}

impl From<MembershipError> for AuthzError {
    fn from(err: MembershipError) -> Self {
        AuthzError::Infrastructure(err.to_string())
    }
}

/// Turns a raw credential into a principal.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolve `raw_token`. Memberships are loaded separately and may be
    /// left empty.
    async fn resolve(&self, raw_token: &str) -> Result<Principal, CredentialError>;
}

/// Read-only access to tenant memberships and their persisted rule overrides.
#[async_trait]
pub trait MembershipLoader: Send + Sync {
    async fn load(&self, principal_id: &str) -> Result<Vec<TenantMembership>, MembershipError>;
}
