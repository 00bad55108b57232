//! Secret lifecycle manager.
//!
//! The [`VaultManager`] is the entry point for every secret operation. Each
//! call resolves the caller's access, runs the cipher, optionally anchors a
//! content hash, persists through the [`VaultStore`], writes exactly one
//! access log entry, and publishes a lifecycle event on success.
//!
//! Checks run in a fixed order: existence, access, state (inactive, then
//! expired), payload validation, then cryptography. No persistence happens
//! after a cryptographic failure.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{debug, warn};
use vaultkeeper_core::config::LimitsConfig;
use vaultkeeper_core::SecretString;

use crate::access::{resolve_access, OrgDirectory, StaticOrgDirectory};
use crate::anchor::IntegrityAnchor;
use crate::audit::AuditLog;
use crate::crypto::{hash_for_anchor, EnvelopeCipher};
use crate::error::{Result, SecretError};
use crate::events::{EventBus, VaultEvent, VaultEventKind};
use crate::store::VaultStore;
use crate::types::{
    decode_ciphertext, encode_ciphertext, AccessAction, AccessLevel, AccessLogEntry, Caller,
    CreateSecretParams, EncryptionParams, ListFilter, SecretType, SecretView, ShareGrant,
    ShareParams, UpdateSecretParams, VaultItem, VaultItemChanges, VaultItemSummary, VaultStats,
    ENCRYPTION_METHOD,
};
use crate::validation::{validate_create, validate_share, validate_update};

/// An item together with the caller's view of it.
struct Loaded {
    item: VaultItem,
    shares: Vec<ShareGrant>,
    access: AccessLevel,
}

/// Orchestrates secret create/read/update/rotate/delete and sharing.
pub struct VaultManager {
    store: Arc<dyn VaultStore>,
    cipher: Arc<EnvelopeCipher>,
    anchor: Option<Arc<dyn IntegrityAnchor>>,
    events: Option<Arc<dyn EventBus>>,
    orgs: Arc<dyn OrgDirectory>,
    audit: AuditLog,
    limits: LimitsConfig,
}

/// Builder for [`VaultManager`].
pub struct VaultManagerBuilder {
    store: Arc<dyn VaultStore>,
    cipher: Arc<EnvelopeCipher>,
    anchor: Option<Arc<dyn IntegrityAnchor>>,
    events: Option<Arc<dyn EventBus>>,
    orgs: Option<Arc<dyn OrgDirectory>>,
    limits: LimitsConfig,
}

impl VaultManagerBuilder {
    /// Anchor content hashes in an external ledger.
    pub fn with_anchor(mut self, anchor: Arc<dyn IntegrityAnchor>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    /// Publish lifecycle events.
    pub fn with_events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Resolve organization membership for org-targeted shares.
    pub fn with_org_directory(mut self, orgs: Arc<dyn OrgDirectory>) -> Self {
        self.orgs = Some(orgs);
        self
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> VaultManager {
        VaultManager {
            audit: AuditLog::new(self.store.clone()),
            store: self.store,
            cipher: self.cipher,
            anchor: self.anchor,
            events: self.events,
            orgs: self
                .orgs
                .unwrap_or_else(|| Arc::new(StaticOrgDirectory::new())),
            limits: self.limits,
        }
    }
}

impl VaultManager {
    /// Start building a manager over `store` and `cipher`.
    pub fn builder(store: Arc<dyn VaultStore>, cipher: Arc<EnvelopeCipher>) -> VaultManagerBuilder {
        VaultManagerBuilder {
            store,
            cipher,
            anchor: None,
            events: None,
            orgs: None,
            limits: LimitsConfig::default(),
        }
    }

    pub fn store(&self) -> &Arc<dyn VaultStore> {
        &self.store
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    // --- Lifecycle ---

    /// Encrypt and store a new secret owned by the caller.
    pub async fn create_secret(
        &self,
        caller: &Caller,
        params: CreateSecretParams,
    ) -> Result<VaultItemSummary> {
        let vault_id = vaultkeeper_core::id::uuid();
        let outcome = self.insert(&vault_id, caller, params).await;
        self.audit
            .record(&vault_id, caller, AccessAction::Create, &outcome)
            .await;

        let item = outcome?;
        debug!(vault_id = %item.vault_id, user_id = %caller.user_id, "created secret");
        self.publish(VaultEvent::new(
            VaultEventKind::Created,
            &item.vault_id,
            &caller.user_id,
            item.secret_type,
        ))
        .await;
        Ok(VaultItemSummary::from(&item))
    }

    /// Read a secret, decrypting it when `decrypt` is set.
    ///
    /// A decrypted read of an anchored item also checks the anchor; the
    /// result is reported in [`SecretView::verified`] and never fails the read.
    pub async fn get_secret(
        &self,
        vault_id: &str,
        caller: &Caller,
        decrypt: bool,
    ) -> Result<SecretView> {
        let outcome = self.read(vault_id, caller, decrypt).await;
        self.audit
            .record(vault_id, caller, AccessAction::Read, &outcome)
            .await;

        let view = outcome?;
        self.publish(VaultEvent::new(
            VaultEventKind::Accessed,
            vault_id,
            &caller.user_id,
            view.item.secret_type,
        ))
        .await;
        Ok(view)
    }

    /// Update display fields and, optionally, the value.
    ///
    /// Requires owner or read-write access. A new value is re-encrypted under
    /// a fresh DEK and nonce and bumps `version`.
    pub async fn update_secret(
        &self,
        vault_id: &str,
        caller: &Caller,
        params: UpdateSecretParams,
    ) -> Result<VaultItemSummary> {
        let value_changed = params.value.is_some();
        let outcome = self.modify(vault_id, caller, params).await;
        self.audit
            .record(vault_id, caller, AccessAction::Update, &outcome)
            .await;

        let item = outcome?;
        self.publish(
            VaultEvent::new(
                VaultEventKind::Updated,
                vault_id,
                &caller.user_id,
                item.secret_type,
            )
            .with_details(json!({ "version": item.version, "value_changed": value_changed })),
        )
        .await;
        Ok(VaultItemSummary::from(&item))
    }

    /// Replace the value. Same rules as [`VaultManager::update_secret`],
    /// audited as a rotation.
    pub async fn rotate_secret(
        &self,
        vault_id: &str,
        caller: &Caller,
        new_value: impl Into<SecretString>,
    ) -> Result<VaultItemSummary> {
        let outcome = self
            .modify(vault_id, caller, UpdateSecretParams::value(new_value))
            .await;
        self.audit
            .record(vault_id, caller, AccessAction::Rotate, &outcome)
            .await;

        let item = outcome?;
        self.publish(
            VaultEvent::new(
                VaultEventKind::Rotated,
                vault_id,
                &caller.user_id,
                item.secret_type,
            )
            .with_details(json!({ "version": item.version })),
        )
        .await;
        Ok(VaultItemSummary::from(&item))
    }

    /// Re-wrap the value under a fresh DEK without changing it.
    ///
    /// `version` is unchanged since the plaintext is the same.
    pub async fn rotate_key(&self, vault_id: &str, caller: &Caller) -> Result<VaultItemSummary> {
        let outcome = self.rewrap(vault_id, caller).await;
        self.audit
            .record(vault_id, caller, AccessAction::Rotate, &outcome)
            .await;

        let item = outcome?;
        self.publish(
            VaultEvent::new(
                VaultEventKind::Rotated,
                vault_id,
                &caller.user_id,
                item.secret_type,
            )
            .with_details(json!({ "version": item.version, "dek_only": true })),
        )
        .await;
        Ok(VaultItemSummary::from(&item))
    }

    /// Soft-delete a secret. Owner only. Shares and logs are kept.
    pub async fn delete_secret(&self, vault_id: &str, caller: &Caller) -> Result<()> {
        let outcome = self.deactivate(vault_id, caller).await;
        self.audit
            .record(vault_id, caller, AccessAction::Delete, &outcome)
            .await;

        let secret_type = outcome?;
        self.publish(VaultEvent::new(
            VaultEventKind::Deleted,
            vault_id,
            &caller.user_id,
            secret_type,
        ))
        .await;
        Ok(())
    }

    // --- Sharing ---

    /// Grant another user or an organization access. Owner only.
    pub async fn share_secret(
        &self,
        vault_id: &str,
        caller: &Caller,
        params: ShareParams,
    ) -> Result<ShareGrant> {
        let outcome = self.grant(vault_id, caller, params).await;
        self.audit
            .record(vault_id, caller, AccessAction::Share, &outcome)
            .await;

        let (grant, secret_type) = outcome?;
        self.publish(
            VaultEvent::new(VaultEventKind::Shared, vault_id, &caller.user_id, secret_type)
                .with_details(json!({
                    "share_id": grant.share_id,
                    "shared_with_user_id": grant.shared_with_user_id,
                    "shared_with_org_id": grant.shared_with_org_id,
                    "permission_level": grant.permission_level,
                })),
        )
        .await;
        Ok(grant)
    }

    /// Revoke a grant on `vault_id`. Owner only.
    pub async fn revoke_share(
        &self,
        vault_id: &str,
        share_id: &str,
        caller: &Caller,
    ) -> Result<()> {
        let outcome = self.ungrant(vault_id, share_id, caller).await;
        self.audit
            .record(vault_id, caller, AccessAction::RevokeShare, &outcome)
            .await;
        outcome
    }

    /// All grants on a secret, including revoked and expired ones. Owner only.
    pub async fn list_shares(&self, vault_id: &str, caller: &Caller) -> Result<Vec<ShareGrant>> {
        let loaded = self.load(vault_id, caller).await?;
        require(loaded.access.can_manage())?;
        Ok(loaded.shares)
    }

    // --- Queries ---

    /// The caller's own secrets, metadata only.
    pub async fn list_secrets(
        &self,
        caller: &Caller,
        filter: &ListFilter,
    ) -> Result<Vec<VaultItemSummary>> {
        let items = self.store.list_for_user(&caller.user_id, filter).await?;
        Ok(items.iter().map(VaultItemSummary::from).collect())
    }

    /// Access history for a secret, newest first. Owner only.
    pub async fn get_access_logs(
        &self,
        vault_id: &str,
        caller: &Caller,
        limit: usize,
    ) -> Result<Vec<AccessLogEntry>> {
        let loaded = self.load(vault_id, caller).await?;
        require(loaded.access.can_manage())?;
        self.store.get_access_logs(vault_id, limit).await
    }

    pub async fn get_stats(&self, caller: &Caller) -> Result<VaultStats> {
        let window = Duration::days(i64::from(self.limits.expiring_soon_days));
        self.store
            .get_stats(&caller.user_id, Utc::now(), window)
            .await
    }

    /// Active secrets whose rotation window has elapsed.
    pub async fn secrets_due_for_rotation(&self, caller: &Caller) -> Result<Vec<VaultItemSummary>> {
        let now = Utc::now();
        let items = self
            .store
            .list_for_user(&caller.user_id, &ListFilter::default())
            .await?;
        Ok(items
            .iter()
            .filter(|item| item.needs_rotation(now))
            .map(VaultItemSummary::from)
            .collect())
    }

    /// Permanently erase every secret the caller owns, with their grants.
    ///
    /// Access logs are retained and one `ERASE` entry is added per secret.
    /// When there is no secret to attach the entry to (the caller owns none,
    /// or listing them failed) a single entry is written under
    /// `user:{user_id}` instead. Returns the number of secrets erased.
    pub async fn erase_user(&self, caller: &Caller) -> Result<usize> {
        let all = ListFilter {
            include_inactive: true,
            ..Default::default()
        };
        let (items, outcome) = match self.store.list_for_user(&caller.user_id, &all).await {
            Ok(items) => {
                let outcome = self.store.delete_all_for_user(&caller.user_id).await;
                (items, outcome)
            }
            Err(e) => (Vec::new(), Err(e)),
        };

        let mut targets: Vec<String> = match &outcome {
            Ok(ids) => ids.clone(),
            Err(_) => items.iter().map(|i| i.vault_id.clone()).collect(),
        };
        if targets.is_empty() {
            targets.push(user_scope(&caller.user_id));
        }
        for vault_id in &targets {
            self.audit
                .record(vault_id, caller, AccessAction::Erase, &outcome)
                .await;
        }
        let erased = outcome?;

        for item in items.iter().filter(|i| erased.contains(&i.vault_id)) {
            self.publish(
                VaultEvent::new(
                    VaultEventKind::Deleted,
                    &item.vault_id,
                    &caller.user_id,
                    item.secret_type,
                )
                .with_details(json!({ "erased": true })),
            )
            .await;
        }
        debug!(user_id = %caller.user_id, count = erased.len(), "erased user secrets");
        Ok(erased.len())
    }

    // --- Internals ---

    async fn insert(
        &self,
        vault_id: &str,
        caller: &Caller,
        params: CreateSecretParams,
    ) -> Result<VaultItem> {
        validate_create(&params, &self.limits)?;

        let encrypted = self
            .cipher
            .encrypt(params.value.expose_bytes(), &caller.user_id, None)?;

        let blockchain_reference = match &self.anchor {
            Some(anchor) => {
                anchor
                    .commit(vault_id, &hash_for_anchor(params.value.expose_bytes()))
                    .await
            }
            None => None,
        };

        let CreateSecretParams {
            name,
            secret_type,
            provider,
            description,
            tags,
            mut metadata,
            organization_id,
            expires_at,
            rotation_enabled,
            rotation_days,
            ..
        } = params;
        metadata.extend(EncryptionParams::from_encrypted(&encrypted).to_metadata());

        let now = Utc::now();
        let item = VaultItem {
            vault_id: vault_id.to_string(),
            user_id: caller.user_id.clone(),
            organization_id,
            secret_type,
            provider,
            name: name.trim().to_string(),
            description,
            tags,
            metadata,
            encrypted_value: encode_ciphertext(&encrypted.ciphertext),
            encryption_method: ENCRYPTION_METHOD.to_string(),
            version: 1,
            is_active: true,
            expires_at,
            rotation_enabled,
            rotation_days: if rotation_enabled { rotation_days } else { None },
            access_count: 0,
            last_accessed_at: None,
            blockchain_reference,
            created_at: now,
            updated_at: now,
        };

        self.store.create(&item).await?;
        Ok(item)
    }

    async fn read(&self, vault_id: &str, caller: &Caller, decrypt: bool) -> Result<SecretView> {
        let Loaded {
            mut item, access, ..
        } = self.load(vault_id, caller).await?;
        require(access.can_read())?;
        ensure_usable(&item)?;

        let mut verified = None;
        let value = if decrypt {
            let secret = self.decrypt_item(&item)?;
            if let (Some(anchor), Some(reference)) = (&self.anchor, &item.blockchain_reference) {
                let hash = hash_for_anchor(secret.expose_bytes());
                let ok = anchor.verify(vault_id, &hash, reference).await;
                if !ok {
                    warn!(vault_id, "integrity verification failed");
                }
                verified = Some(ok);
            }
            Some(secret.into())
        } else {
            None
        };

        let now = Utc::now();
        item.access_count = self.store.increment_access(vault_id, now).await?;
        item.last_accessed_at = Some(now);

        Ok(SecretView {
            item: VaultItemSummary::from(&item),
            value,
            access,
            verified,
        })
    }

    async fn modify(
        &self,
        vault_id: &str,
        caller: &Caller,
        params: UpdateSecretParams,
    ) -> Result<VaultItem> {
        let Loaded { item, access, .. } = self.load(vault_id, caller).await?;
        require(access.can_write())?;
        if !item.is_active {
            return Err(SecretError::Inactive(vault_id.to_string()));
        }
        validate_update(&params, item.rotation_enabled, item.rotation_days, &self.limits)?;

        let UpdateSecretParams {
            name,
            description,
            tags,
            mut metadata,
            value,
            expires_at,
            rotation_enabled,
            rotation_days,
        } = params;

        let mut changes = VaultItemChanges::at(Utc::now());
        changes.name = name.map(|n| n.trim().to_string());
        changes.description = description;
        changes.tags = tags;
        changes.expires_at = expires_at;
        changes.rotation_enabled = rotation_enabled;
        changes.rotation_days = match rotation_enabled {
            Some(false) => Some(None),
            _ => rotation_days,
        };

        if let Some(value) = value {
            // The KEK is always the owner's, whoever is writing.
            let current = item.encryption_params()?;
            let (_, kek_salt, _) = current.decode()?;
            let encrypted = self
                .cipher
                .encrypt(value.expose_bytes(), &item.user_id, Some(&kek_salt))?;

            let mut merged = metadata.take().unwrap_or_default();
            merged.extend(EncryptionParams::from_encrypted(&encrypted).to_metadata());
            metadata = Some(merged);
            changes.encrypted_value = Some(encode_ciphertext(&encrypted.ciphertext));
            changes.version = Some(item.version + 1);

            if let Some(anchor) = &self.anchor {
                let reference = anchor
                    .commit(vault_id, &hash_for_anchor(value.expose_bytes()))
                    .await;
                changes.blockchain_reference = Some(reference);
            }
        }
        changes.metadata = metadata;

        self.store.update(vault_id, &changes).await
    }

    async fn rewrap(&self, vault_id: &str, caller: &Caller) -> Result<VaultItem> {
        let Loaded { item, access, .. } = self.load(vault_id, caller).await?;
        require(access.can_write())?;
        if !item.is_active {
            return Err(SecretError::Inactive(vault_id.to_string()));
        }

        let params = item.encryption_params()?;
        let (dek_encrypted, kek_salt, nonce) = params.decode()?;
        let ciphertext = decode_ciphertext(&item.encrypted_value)?;
        let rotated =
            self.cipher
                .rotate_dek(&ciphertext, &dek_encrypted, &kek_salt, &nonce, &item.user_id)?;

        let mut changes = VaultItemChanges::at(Utc::now());
        changes.encrypted_value = Some(encode_ciphertext(&rotated.ciphertext));
        changes.metadata =
            Some(EncryptionParams::from_rotated(&rotated, &params.kek_salt).to_metadata());
        self.store.update(vault_id, &changes).await
    }

    async fn deactivate(&self, vault_id: &str, caller: &Caller) -> Result<SecretType> {
        let Loaded { item, access, .. } = self.load(vault_id, caller).await?;
        require(access.can_manage())?;
        if !item.is_active {
            return Err(SecretError::Inactive(vault_id.to_string()));
        }
        self.store.soft_delete(vault_id, Utc::now()).await?;
        Ok(item.secret_type)
    }

    async fn grant(
        &self,
        vault_id: &str,
        caller: &Caller,
        params: ShareParams,
    ) -> Result<(ShareGrant, SecretType)> {
        validate_share(&params, &caller.user_id)?;
        let Loaded { item, access, .. } = self.load(vault_id, caller).await?;
        require(access.can_manage())?;
        if !item.is_active {
            return Err(SecretError::Inactive(vault_id.to_string()));
        }

        let grant = ShareGrant {
            share_id: vaultkeeper_core::id::uuid(),
            vault_id: vault_id.to_string(),
            owner_user_id: item.user_id.clone(),
            shared_with_user_id: params.shared_with_user_id,
            shared_with_org_id: params.shared_with_org_id,
            permission_level: params.permission_level,
            expires_at: params.expires_at,
            is_active: true,
            created_at: Utc::now(),
        };
        self.store.create_share(&grant).await?;
        Ok((grant, item.secret_type))
    }

    async fn ungrant(&self, vault_id: &str, share_id: &str, caller: &Caller) -> Result<()> {
        let loaded = self.load(vault_id, caller).await?;
        require(loaded.access.can_manage())?;
        if !loaded.shares.iter().any(|s| s.share_id == share_id) {
            return Err(SecretError::NotFound(share_id.to_string()));
        }
        if !self.store.revoke_share(share_id).await? {
            return Err(SecretError::NotFound(share_id.to_string()));
        }
        Ok(())
    }

    async fn load(&self, vault_id: &str, caller: &Caller) -> Result<Loaded> {
        let item = self
            .store
            .get(vault_id)
            .await?
            .ok_or_else(|| SecretError::NotFound(vault_id.to_string()))?;
        let shares = self.store.get_shares(vault_id).await?;
        let access = resolve_access(
            &item,
            &caller.user_id,
            &shares,
            self.orgs.as_ref(),
            Utc::now(),
        )
        .await?;
        Ok(Loaded {
            item,
            shares,
            access,
        })
    }

    fn decrypt_item(&self, item: &VaultItem) -> Result<SecretString> {
        let (dek_encrypted, kek_salt, nonce) = item.encryption_params()?.decode()?;
        let ciphertext = decode_ciphertext(&item.encrypted_value)?;
        let plaintext =
            self.cipher
                .decrypt(&ciphertext, &dek_encrypted, &kek_salt, &nonce, &item.user_id)?;
        SecretString::from_utf8(plaintext.to_vec()).ok_or(SecretError::DecryptionFailed)
    }

    async fn publish(&self, event: VaultEvent) {
        let Some(bus) = &self.events else {
            return;
        };
        let kind = event.kind;
        let vault_id = event.vault_id.clone();
        if let Err(e) = bus.publish(event).await {
            warn!(event = %kind, vault_id = %vault_id, error = %e, "failed to publish event");
        }
    }
}

/// Audit key for entries that concern a user rather than one secret.
fn user_scope(user_id: &str) -> String {
    format!("user:{user_id}")
}

fn require(allowed: bool) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(SecretError::AccessDenied)
    }
}

fn ensure_usable(item: &VaultItem) -> Result<()> {
    if !item.is_active {
        return Err(SecretError::Inactive(item.vault_id.clone()));
    }
    if item.is_expired(Utc::now()) {
        return Err(SecretError::Expired(item.vault_id.clone()));
    }
    Ok(())
}
