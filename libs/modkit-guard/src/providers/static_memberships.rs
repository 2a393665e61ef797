use std::collections::BTreeMap;

use async_trait::async_trait;
use modkit_ability::TenantMembership;

use crate::traits::{MembershipError, MembershipLoader};

/// In-memory membership store. Unknown principals have no memberships.
#[derive(Debug, Clone, Default)]
pub struct StaticMembershipLoader {
    memberships: BTreeMap<String, Vec<TenantMembership>>,
}

impl StaticMembershipLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(memberships: BTreeMap<String, Vec<TenantMembership>>) -> Self {
        Self { memberships }
    }

    #[must_use]
    pub fn with_memberships(
        mut self,
        principal_id: impl Into<String>,
        memberships: Vec<TenantMembership>,
    ) -> Self {
        self.memberships.insert(principal_id.into(), memberships);
        self
    }
}

#[async_trait]
impl MembershipLoader for StaticMembershipLoader {
    async fn load(&self, principal_id: &str) -> Result<Vec<TenantMembership>, MembershipError> {
        Ok(self
            .memberships
            .get(principal_id)
            .cloned()
            .unwrap_or_default())
    }
}
