use std::collections::BTreeMap;

use async_trait::async_trait;
use modkit_ability::Principal;

use crate::traits::{CredentialError, CredentialResolver};

/// Fixed token -> principal table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    principals: BTreeMap<String, Principal>,
}

impl StaticCredentialResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(principals: BTreeMap<String, Principal>) -> Self {
        Self { principals }
    }

    #[must_use]
    pub fn with_principal(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.principals.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, raw_token: &str) -> Result<Principal, CredentialError> {
        self.principals
            .get(raw_token)
            .cloned()
            .ok_or_else(|| CredentialError::Rejected("unknown token".to_owned()))
    }
}
