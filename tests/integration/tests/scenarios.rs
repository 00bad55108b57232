//! End-to-end lifecycle tests against the file-backed store and ledger.

use chrono::{Duration, Utc};
use tempfile::TempDir;
use vaultkeeper_integration_tests::open_file_vault;
use vaultkeeper_secrets::{
    AccessAction, Caller, CreateSecretParams, PermissionLevel, SecretError, SecretProvider,
    SecretType, ShareParams, UpdateSecretParams, VaultEventKind, VaultStore,
};

fn db_password() -> CreateSecretParams {
    CreateSecretParams::new("DB password", "hunter2")
        .with_type(SecretType::DatabaseCredential)
        .with_provider(SecretProvider::Postgres)
        .with_tags(["prod"])
}

#[tokio::test]
async fn test_create_and_read_back() {
    let dir = TempDir::new().unwrap();
    let vault = open_file_vault(dir.path(), 1).await;
    let u1 = Caller::new("u1");

    let created = vault.manager.create_secret(&u1, db_password()).await.unwrap();
    let view = vault
        .manager
        .get_secret(&created.vault_id, &u1, true)
        .await
        .unwrap();

    assert_eq!(view.value.unwrap().expose(), "hunter2");
    assert_eq!(view.item.access_count, 1);
    assert_eq!(view.verified, Some(true));
    assert!(view.item.blockchain_reference.is_some());
}

#[tokio::test]
async fn test_read_share_allows_read_but_not_delete() {
    let dir = TempDir::new().unwrap();
    let vault = open_file_vault(dir.path(), 1).await;
    let (u1, u2) = (Caller::new("u1"), Caller::new("u2"));

    let created = vault.manager.create_secret(&u1, db_password()).await.unwrap();
    vault
        .manager
        .share_secret(
            &created.vault_id,
            &u1,
            ShareParams::with_user("u2", PermissionLevel::Read),
        )
        .await
        .unwrap();

    let view = vault
        .manager
        .get_secret(&created.vault_id, &u2, true)
        .await
        .unwrap();
    assert_eq!(view.value.unwrap().expose(), "hunter2");

    let err = vault
        .manager
        .delete_secret(&created.vault_id, &u2)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::AccessDenied));
}

#[tokio::test]
async fn test_expired_share_is_denied() {
    let dir = TempDir::new().unwrap();
    let vault = open_file_vault(dir.path(), 1).await;
    let (u1, u2) = (Caller::new("u1"), Caller::new("u2"));

    let created = vault.manager.create_secret(&u1, db_password()).await.unwrap();
    vault
        .manager
        .share_secret(
            &created.vault_id,
            &u1,
            ShareParams::with_user("u2", PermissionLevel::Read)
                .expiring(Utc::now() - Duration::hours(1)),
        )
        .await
        .unwrap();

    let err = vault
        .manager
        .get_secret(&created.vault_id, &u2, true)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::AccessDenied));
}

#[tokio::test]
async fn test_value_update_bumps_version() {
    let dir = TempDir::new().unwrap();
    let vault = open_file_vault(dir.path(), 1).await;
    let u1 = Caller::new("u1");

    let created = vault.manager.create_secret(&u1, db_password()).await.unwrap();
    let store = vault.manager.store();
    let before = store.get(&created.vault_id).await.unwrap().unwrap();

    let updated = vault
        .manager
        .update_secret(&created.vault_id, &u1, UpdateSecretParams::value("correct horse"))
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert!(!updated.metadata.contains_key("nonce"));

    let after = store.get(&created.vault_id).await.unwrap().unwrap();
    assert_ne!(after.metadata["nonce"], before.metadata["nonce"]);
    assert_eq!(after.metadata["kek_salt"], before.metadata["kek_salt"]);

    let view = vault
        .manager
        .get_secret(&created.vault_id, &u1, true)
        .await
        .unwrap();
    assert_eq!(view.value.unwrap().expose(), "correct horse");
    assert_eq!(view.verified, Some(true));
}

#[tokio::test]
async fn test_delete_keeps_record_for_audit() {
    let dir = TempDir::new().unwrap();
    let vault = open_file_vault(dir.path(), 1).await;
    let u1 = Caller::new("u1");

    let created = vault.manager.create_secret(&u1, db_password()).await.unwrap();
    vault
        .manager
        .delete_secret(&created.vault_id, &u1)
        .await
        .unwrap();

    let err = vault
        .manager
        .get_secret(&created.vault_id, &u1, true)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::Inactive(_)));

    let stored = vault
        .manager
        .store()
        .get(&created.vault_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.is_active);

    let logs = vault
        .manager
        .get_access_logs(&created.vault_id, &u1, 10)
        .await
        .unwrap();
    let actions: Vec<_> = logs.iter().map(|l| l.action).collect();
    assert_eq!(
        actions,
        vec![AccessAction::Read, AccessAction::Delete, AccessAction::Create]
    );
    assert!(!logs[0].success);
}

#[tokio::test]
async fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let u1 = Caller::new("u1");

    let vault_id = {
        let vault = open_file_vault(dir.path(), 1).await;
        let created = vault.manager.create_secret(&u1, db_password()).await.unwrap();
        vault
            .manager
            .share_secret(
                &created.vault_id,
                &u1,
                ShareParams::with_org("org-a", PermissionLevel::Read),
            )
            .await
            .unwrap();
        created.vault_id
    };

    let vault = open_file_vault(dir.path(), 1).await;
    vault.orgs.add_member("org-a", "u3").await;

    let view = vault
        .manager
        .get_secret(&vault_id, &Caller::new("u3"), true)
        .await
        .unwrap();
    assert_eq!(view.value.unwrap().expose(), "hunter2");
    assert_eq!(view.verified, Some(true));

    let shares = vault.manager.list_shares(&vault_id, &u1).await.unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].shared_with_org_id.as_deref(), Some("org-a"));
}

#[tokio::test]
async fn test_wrong_master_key_cannot_decrypt() {
    let dir = TempDir::new().unwrap();
    let u1 = Caller::new("u1");

    let vault_id = {
        let vault = open_file_vault(dir.path(), 1).await;
        vault
            .manager
            .create_secret(&u1, db_password())
            .await
            .unwrap()
            .vault_id
    };

    let vault = open_file_vault(dir.path(), 2).await;
    let err = vault
        .manager
        .get_secret(&vault_id, &u1, true)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::DecryptionFailed));

    let view = vault.manager.get_secret(&vault_id, &u1, false).await.unwrap();
    assert!(view.value.is_none());
}

#[tokio::test]
async fn test_rotation_flow_and_events() {
    let dir = TempDir::new().unwrap();
    let vault = open_file_vault(dir.path(), 1).await;
    let mut rx = vault.events.subscribe();
    let u1 = Caller::new("u1");

    let created = vault
        .manager
        .create_secret(&u1, db_password().with_rotation(30))
        .await
        .unwrap();
    vault
        .manager
        .rotate_secret(&created.vault_id, &u1, "rotated")
        .await
        .unwrap();
    let rekeyed = vault
        .manager
        .rotate_key(&created.vault_id, &u1)
        .await
        .unwrap();
    assert_eq!(rekeyed.version, 2);

    let view = vault
        .manager
        .get_secret(&created.vault_id, &u1, true)
        .await
        .unwrap();
    assert_eq!(view.value.unwrap().expose(), "rotated");

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.vault_id, created.vault_id);
        kinds.push(event.kind);
    }
    assert_eq!(
        kinds,
        vec![
            VaultEventKind::Created,
            VaultEventKind::Rotated,
            VaultEventKind::Rotated,
            VaultEventKind::Accessed,
        ]
    );
}

#[tokio::test]
async fn test_erase_user_removes_only_their_items() {
    let dir = TempDir::new().unwrap();
    let vault = open_file_vault(dir.path(), 1).await;
    let (u1, u2) = (Caller::new("u1"), Caller::new("u2"));

    let mine = vault.manager.create_secret(&u1, db_password()).await.unwrap();
    let theirs = vault.manager.create_secret(&u2, db_password()).await.unwrap();

    assert_eq!(vault.manager.erase_user(&u1).await.unwrap(), 1);

    let err = vault
        .manager
        .get_secret(&mine.vault_id, &u1, false)
        .await
        .unwrap_err();
    assert!(matches!(err, SecretError::NotFound(_)));
    assert!(vault
        .manager
        .get_secret(&theirs.vault_id, &u2, true)
        .await
        .is_ok());

    let stats = vault.manager.get_stats(&u1).await.unwrap();
    assert_eq!(stats.total, 0);
}
