//! Persistence collaborator.
//!
//! Defines the [`VaultStore`] contract the lifecycle manager calls into and
//! two implementations: [`InMemoryVaultStore`] for tests and embedding, and
//! [`FileVaultStore`], which snapshots the whole state to a JSON file after
//! every mutation. Neither ever sees plaintext.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, SecretError};
use crate::types::{
    AccessLogEntry, ListFilter, ShareGrant, VaultItem, VaultItemChanges, VaultStats,
};

/// Async trait for secret persistence backends.
///
/// Implementations report their own failures as [`SecretError::Persistence`]
/// and perform no retries.
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Insert a new item. Fails if the id already exists.
    async fn create(&self, item: &VaultItem) -> Result<()>;

    /// Fetch an item, including ciphertext, active or not.
    async fn get(&self, vault_id: &str) -> Result<Option<VaultItem>>;

    /// Apply a change set and return the updated item.
    async fn update(&self, vault_id: &str, changes: &VaultItemChanges) -> Result<VaultItem>;

    /// Mark an item inactive.
    async fn soft_delete(&self, vault_id: &str, at: DateTime<Utc>) -> Result<()>;

    /// Bump `access_count` and `last_accessed_at`; returns the new count.
    async fn increment_access(&self, vault_id: &str, at: DateTime<Utc>) -> Result<u64>;

    /// Items owned by `user_id` matching `filter`, newest first.
    async fn list_for_user(&self, user_id: &str, filter: &ListFilter) -> Result<Vec<VaultItem>>;

    async fn create_share(&self, share: &ShareGrant) -> Result<()>;

    /// All grants for an item, including revoked and expired ones.
    async fn get_shares(&self, vault_id: &str) -> Result<Vec<ShareGrant>>;

    /// Soft-revoke a grant. Returns false if no such grant exists.
    async fn revoke_share(&self, share_id: &str) -> Result<bool>;

    /// Append an access log entry.
    async fn create_access_log(&self, entry: &AccessLogEntry) -> Result<()>;

    /// Access log entries for an item, newest first.
    async fn get_access_logs(&self, vault_id: &str, limit: usize) -> Result<Vec<AccessLogEntry>>;

    async fn get_stats(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        expiring_window: Duration,
    ) -> Result<VaultStats>;

    /// Hard-delete every item owned by `user_id` and the grants on them.
    /// Access log entries are kept. Returns the erased vault ids.
    async fn delete_all_for_user(&self, user_id: &str) -> Result<Vec<String>>;
}

/// Snapshot of everything a store holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VaultState {
    #[serde(default)]
    items: HashMap<String, VaultItem>,
    #[serde(default)]
    shares: HashMap<String, ShareGrant>,
    #[serde(default)]
    access_logs: Vec<AccessLogEntry>,
}

impl VaultState {
    fn create(&mut self, item: &VaultItem) -> Result<()> {
        if self.items.contains_key(&item.vault_id) {
            return Err(SecretError::Persistence(format!(
                "duplicate vault_id: {}",
                item.vault_id
            )));
        }
        self.items.insert(item.vault_id.clone(), item.clone());
        Ok(())
    }

    fn item_mut(&mut self, vault_id: &str) -> Result<&mut VaultItem> {
        self.items
            .get_mut(vault_id)
            .ok_or_else(|| SecretError::NotFound(vault_id.to_string()))
    }

    fn update(&mut self, vault_id: &str, changes: &VaultItemChanges) -> Result<VaultItem> {
        let item = self.item_mut(vault_id)?;
        item.apply(changes);
        Ok(item.clone())
    }

    fn soft_delete(&mut self, vault_id: &str, at: DateTime<Utc>) -> Result<()> {
        let item = self.item_mut(vault_id)?;
        item.is_active = false;
        item.updated_at = at;
        Ok(())
    }

    fn increment_access(&mut self, vault_id: &str, at: DateTime<Utc>) -> Result<u64> {
        let item = self.item_mut(vault_id)?;
        item.access_count += 1;
        item.last_accessed_at = Some(at);
        Ok(item.access_count)
    }

    fn list_for_user(&self, user_id: &str, filter: &ListFilter) -> Vec<VaultItem> {
        let mut items: Vec<VaultItem> = self
            .items
            .values()
            .filter(|i| i.user_id == user_id && filter.matches(i))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.name.cmp(&b.name)));
        items
    }

    fn create_share(&mut self, share: &ShareGrant) -> Result<()> {
        if !self.items.contains_key(&share.vault_id) {
            return Err(SecretError::NotFound(share.vault_id.clone()));
        }
        self.shares.insert(share.share_id.clone(), share.clone());
        Ok(())
    }

    fn get_shares(&self, vault_id: &str) -> Vec<ShareGrant> {
        let mut shares: Vec<ShareGrant> = self
            .shares
            .values()
            .filter(|s| s.vault_id == vault_id)
            .cloned()
            .collect();
        shares.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        shares
    }

    fn revoke_share(&mut self, share_id: &str) -> bool {
        match self.shares.get_mut(share_id) {
            Some(share) => {
                share.is_active = false;
                true
            }
            None => false,
        }
    }

    fn get_access_logs(&self, vault_id: &str, limit: usize) -> Vec<AccessLogEntry> {
        self.access_logs
            .iter()
            .rev()
            .filter(|e| e.vault_id == vault_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn stats(&self, user_id: &str, now: DateTime<Utc>, expiring_window: Duration) -> VaultStats {
        let mut stats = VaultStats::default();
        for item in self.items.values().filter(|i| i.user_id == user_id) {
            stats.total += 1;
            stats.total_accesses += item.access_count;
            if !item.is_active {
                stats.inactive += 1;
                continue;
            }
            stats.active += 1;
            *stats.by_type.entry(item.secret_type.to_string()).or_default() += 1;
            *stats.by_provider.entry(item.provider.to_string()).or_default() += 1;

            if item.is_expired(now) {
                stats.expired += 1;
            } else if item
                .expires_at
                .map_or(false, |exp| exp <= now + expiring_window)
            {
                stats.expiring_soon += 1;
            }
            if item.needs_rotation(now) {
                stats.due_for_rotation += 1;
            }
            if self
                .shares
                .values()
                .any(|s| s.vault_id == item.vault_id && s.is_valid_at(now))
            {
                stats.shared += 1;
            }
        }
        stats
    }

    fn delete_all_for_user(&mut self, user_id: &str) -> Vec<String> {
        let erased: Vec<String> = self
            .items
            .values()
            .filter(|i| i.user_id == user_id)
            .map(|i| i.vault_id.clone())
            .collect();
        for vault_id in &erased {
            self.items.remove(vault_id);
        }
        self.shares.retain(|_, s| !erased.contains(&s.vault_id));
        erased
    }
}

/// In-memory store. Contents are lost when the process exits.
#[derive(Default)]
pub struct InMemoryVaultStore {
    state: RwLock<VaultState>,
}

impl InMemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VaultStore for InMemoryVaultStore {
    async fn create(&self, item: &VaultItem) -> Result<()> {
        self.state.write().await.create(item)
    }

    async fn get(&self, vault_id: &str) -> Result<Option<VaultItem>> {
        Ok(self.state.read().await.items.get(vault_id).cloned())
    }

    async fn update(&self, vault_id: &str, changes: &VaultItemChanges) -> Result<VaultItem> {
        self.state.write().await.update(vault_id, changes)
    }

    async fn soft_delete(&self, vault_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.state.write().await.soft_delete(vault_id, at)
    }

    async fn increment_access(&self, vault_id: &str, at: DateTime<Utc>) -> Result<u64> {
        self.state.write().await.increment_access(vault_id, at)
    }

    async fn list_for_user(&self, user_id: &str, filter: &ListFilter) -> Result<Vec<VaultItem>> {
        Ok(self.state.read().await.list_for_user(user_id, filter))
    }

    async fn create_share(&self, share: &ShareGrant) -> Result<()> {
        self.state.write().await.create_share(share)
    }

    async fn get_shares(&self, vault_id: &str) -> Result<Vec<ShareGrant>> {
        Ok(self.state.read().await.get_shares(vault_id))
    }

    async fn revoke_share(&self, share_id: &str) -> Result<bool> {
        Ok(self.state.write().await.revoke_share(share_id))
    }

    async fn create_access_log(&self, entry: &AccessLogEntry) -> Result<()> {
        self.state.write().await.access_logs.push(entry.clone());
        Ok(())
    }

    async fn get_access_logs(&self, vault_id: &str, limit: usize) -> Result<Vec<AccessLogEntry>> {
        Ok(self.state.read().await.get_access_logs(vault_id, limit))
    }

    async fn get_stats(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        expiring_window: Duration,
    ) -> Result<VaultStats> {
        Ok(self.state.read().await.stats(user_id, now, expiring_window))
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        Ok(self.state.write().await.delete_all_for_user(user_id))
    }
}

/// A file-backed store.
///
/// The full state lives in `{base_dir}/vault.json`, rewritten atomically
/// (tmp file + rename) after every mutation. Directory mode is `0700` and
/// file mode `0600` on Unix.
///
/// Meant for a single local user: every mutation rewrites the whole snapshot,
/// including the append-only access log, so a read that bumps the access
/// counter costs two full writes and grows with the log.
pub struct FileVaultStore {
    path: PathBuf,
    state: RwLock<VaultState>,
}

impl FileVaultStore {
    const FILE_NAME: &'static str = "vault.json";

    /// Open (or start) a store rooted at `base_dir`.
    pub async fn open(base_dir: &Path) -> Result<Self> {
        ensure_dir(base_dir).await?;
        let path = base_dir.join(Self::FILE_NAME);

        let state = if tokio::fs::try_exists(&path).await.map_err(persistence)? {
            let data = tokio::fs::read_to_string(&path).await.map_err(persistence)?;
            serde_json::from_str(&data).map_err(persistence)?
        } else {
            VaultState::default()
        };
        debug!(path = %path.display(), items = state.items.len(), "opened vault store");

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn save(&self, state: &VaultState) -> Result<()> {
        let tmp_path = self.path.with_extension("tmp");
        let data = serde_json::to_vec_pretty(state).map_err(persistence)?;
        tokio::fs::write(&tmp_path, data).await.map_err(persistence)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp_path, perms)
                .await
                .map_err(persistence)?;
        }

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    /// Run a mutation against a copy of the state and persist it. The copy
    /// replaces the live state only once the write has succeeded.
    async fn mutate<T>(&self, f: impl FnOnce(&mut VaultState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let out = f(&mut next)?;
        self.save(&next).await?;
        *state = next;
        Ok(out)
    }
}

#[async_trait]
impl VaultStore for FileVaultStore {
    async fn create(&self, item: &VaultItem) -> Result<()> {
        self.mutate(|s| s.create(item)).await
    }

    async fn get(&self, vault_id: &str) -> Result<Option<VaultItem>> {
        Ok(self.state.read().await.items.get(vault_id).cloned())
    }

    async fn update(&self, vault_id: &str, changes: &VaultItemChanges) -> Result<VaultItem> {
        self.mutate(|s| s.update(vault_id, changes)).await
    }

    async fn soft_delete(&self, vault_id: &str, at: DateTime<Utc>) -> Result<()> {
        self.mutate(|s| s.soft_delete(vault_id, at)).await
    }

    async fn increment_access(&self, vault_id: &str, at: DateTime<Utc>) -> Result<u64> {
        self.mutate(|s| s.increment_access(vault_id, at)).await
    }

    async fn list_for_user(&self, user_id: &str, filter: &ListFilter) -> Result<Vec<VaultItem>> {
        Ok(self.state.read().await.list_for_user(user_id, filter))
    }

    async fn create_share(&self, share: &ShareGrant) -> Result<()> {
        self.mutate(|s| s.create_share(share)).await
    }

    async fn get_shares(&self, vault_id: &str) -> Result<Vec<ShareGrant>> {
        Ok(self.state.read().await.get_shares(vault_id))
    }

    async fn revoke_share(&self, share_id: &str) -> Result<bool> {
        self.mutate(|s| Ok(s.revoke_share(share_id))).await
    }

    async fn create_access_log(&self, entry: &AccessLogEntry) -> Result<()> {
        self.mutate(|s| {
            s.access_logs.push(entry.clone());
            Ok(())
        })
        .await
    }

    async fn get_access_logs(&self, vault_id: &str, limit: usize) -> Result<Vec<AccessLogEntry>> {
        Ok(self.state.read().await.get_access_logs(vault_id, limit))
    }

    async fn get_stats(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        expiring_window: Duration,
    ) -> Result<VaultStats> {
        Ok(self.state.read().await.stats(user_id, now, expiring_window))
    }

    async fn delete_all_for_user(&self, user_id: &str) -> Result<Vec<String>> {
        self.mutate(|s| Ok(s.delete_all_for_user(user_id))).await
    }
}

fn persistence(e: impl std::fmt::Display) -> SecretError {
    SecretError::Persistence(e.to_string())
}

/// Ensure the base directory exists with restrictive permissions.
async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await.map_err(persistence)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        tokio::fs::set_permissions(dir, perms)
            .await
            .map_err(persistence)?;
    }

    Ok(())
}
