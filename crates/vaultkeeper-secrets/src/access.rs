//! Access resolution and organization membership.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::types::{AccessLevel, ShareGrant, VaultItem};

/// Resolves which organizations a user belongs to.
#[async_trait]
pub trait OrgDirectory: Send + Sync {
    async fn organizations_for(&self, user_id: &str) -> Result<Vec<String>>;
}

/// Org membership held in memory.
#[derive(Default)]
pub struct StaticOrgDirectory {
    members: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticOrgDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user_id` to `org_id`.
    pub async fn add_member(&self, org_id: impl Into<String>, user_id: impl Into<String>) {
        let org_id = org_id.into();
        let mut members = self.members.write().await;
        let orgs = members.entry(user_id.into()).or_default();
        if !orgs.contains(&org_id) {
            orgs.push(org_id);
        }
    }

    /// Remove `user_id` from `org_id`.
    pub async fn remove_member(&self, org_id: &str, user_id: &str) {
        if let Some(orgs) = self.members.write().await.get_mut(user_id) {
            orgs.retain(|o| o != org_id);
        }
    }
}

#[async_trait]
impl OrgDirectory for StaticOrgDirectory {
    async fn organizations_for(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self
            .members
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Effective access of `user_id` on `item`.
///
/// The owner always resolves to [`AccessLevel::Owner`]. Otherwise the most
/// permissive grant that is active, unexpired at `now`, and targets the user
/// or one of `org_ids` wins. Everything else is [`AccessLevel::None`].
pub fn evaluate_access(
    item: &VaultItem,
    user_id: &str,
    org_ids: &[String],
    shares: &[ShareGrant],
    now: DateTime<Utc>,
) -> AccessLevel {
    if item.user_id == user_id {
        return AccessLevel::Owner;
    }

    shares
        .iter()
        .filter(|s| s.vault_id == item.vault_id)
        .filter(|s| s.is_valid_at(now))
        .filter(|s| s.targets(user_id, org_ids))
        .map(|s| AccessLevel::from(s.permission_level))
        .max()
        .unwrap_or(AccessLevel::None)
}

/// Resolve access, consulting the org directory only when a grant targets
/// an organization.
pub async fn resolve_access(
    item: &VaultItem,
    user_id: &str,
    shares: &[ShareGrant],
    orgs: &dyn OrgDirectory,
    now: DateTime<Utc>,
) -> Result<AccessLevel> {
    if item.user_id == user_id {
        return Ok(AccessLevel::Owner);
    }

    let org_ids = if shares
        .iter()
        .any(|s| s.shared_with_org_id.is_some() && s.is_valid_at(now))
    {
        orgs.organizations_for(user_id).await?
    } else {
        Vec::new()
    };

    Ok(evaluate_access(item, user_id, &org_ids, shares, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PermissionLevel, SecretProvider, SecretType, ENCRYPTION_METHOD};
    use chrono::Duration;
    use serde_json::Map;

    fn item() -> VaultItem {
        let now = Utc::now();
        VaultItem {
            vault_id: "v1".into(),
            user_id: "owner".into(),
            organization_id: Some("org-a".into()),
            secret_type: SecretType::Token,
            provider: SecretProvider::Github,
            name: "deploy token".into(),
            description: None,
            tags: vec![],
            metadata: Map::new(),
            encrypted_value: String::new(),
            encryption_method: ENCRYPTION_METHOD.into(),
            version: 1,
            is_active: true,
            expires_at: None,
            rotation_enabled: false,
            rotation_days: None,
            access_count: 0,
            last_accessed_at: None,
            blockchain_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn grant(user: Option<&str>, org: Option<&str>, level: PermissionLevel) -> ShareGrant {
        ShareGrant {
            share_id: vaultkeeper_core::id::uuid(),
            vault_id: "v1".into(),
            owner_user_id: "owner".into(),
            shared_with_user_id: user.map(Into::into),
            shared_with_org_id: org.map(Into::into),
            permission_level: level,
            expires_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_always_owner() {
        let now = Utc::now();
        assert_eq!(evaluate_access(&item(), "owner", &[], &[], now), AccessLevel::Owner);
    }

    #[test]
    fn test_no_grant_is_none() {
        let now = Utc::now();
        let shares = vec![grant(Some("u2"), None, PermissionLevel::Read)];
        assert_eq!(evaluate_access(&item(), "u3", &[], &shares, now), AccessLevel::None);
    }

    #[test]
    fn test_direct_grant() {
        let now = Utc::now();
        let shares = vec![grant(Some("u2"), None, PermissionLevel::Read)];
        let level = evaluate_access(&item(), "u2", &[], &shares, now);
        assert_eq!(level, AccessLevel::Read);
        assert!(!level.can_write());
        assert!(!level.can_manage());
    }

    #[test]
    fn test_expired_grant_is_none() {
        let now = Utc::now();
        let mut expired = grant(Some("u2"), None, PermissionLevel::ReadWrite);
        expired.expires_at = Some(now - Duration::seconds(1));
        assert_eq!(evaluate_access(&item(), "u2", &[], &[expired], now), AccessLevel::None);
    }

    #[test]
    fn test_revoked_grant_is_none() {
        let now = Utc::now();
        let mut revoked = grant(Some("u2"), None, PermissionLevel::Read);
        revoked.is_active = false;
        assert_eq!(evaluate_access(&item(), "u2", &[], &[revoked], now), AccessLevel::None);
    }

    #[test]
    fn test_org_grant_requires_membership() {
        let now = Utc::now();
        let shares = vec![grant(None, Some("org-b"), PermissionLevel::Read)];
        assert_eq!(
            evaluate_access(&item(), "u2", &["org-b".into()], &shares, now),
            AccessLevel::Read
        );
        assert_eq!(
            evaluate_access(&item(), "u2", &["org-c".into()], &shares, now),
            AccessLevel::None
        );
    }

    #[test]
    fn test_highest_grant_wins() {
        let now = Utc::now();
        let shares = vec![
            grant(Some("u2"), None, PermissionLevel::Read),
            grant(None, Some("org-b"), PermissionLevel::ReadWrite),
        ];
        assert_eq!(
            evaluate_access(&item(), "u2", &["org-b".into()], &shares, now),
            AccessLevel::ReadWrite
        );
    }

    #[test]
    fn test_item_organization_grants_nothing_implicitly() {
        let now = Utc::now();
        assert_eq!(
            evaluate_access(&item(), "u2", &["org-a".into()], &[], now),
            AccessLevel::None
        );
    }

    #[tokio::test]
    async fn test_resolve_access_uses_directory() {
        let directory = StaticOrgDirectory::new();
        directory.add_member("org-b", "u2").await;
        let shares = vec![grant(None, Some("org-b"), PermissionLevel::ReadWrite)];

        let level = resolve_access(&item(), "u2", &shares, &directory, Utc::now())
            .await
            .unwrap();
        assert_eq!(level, AccessLevel::ReadWrite);

        directory.remove_member("org-b", "u2").await;
        let level = resolve_access(&item(), "u2", &shares, &directory, Utc::now())
            .await
            .unwrap();
        assert_eq!(level, AccessLevel::None);
    }
}
