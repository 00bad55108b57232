//! Shared fixtures for the Vaultkeeper integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vaultkeeper_core::VaultConfig;
use vaultkeeper_secrets::{
    BroadcastEventBus, EnvelopeCipher, FileLedger, FileVaultStore, LedgerAnchor, MasterKey,
    StaticOrgDirectory, VaultManager,
};

/// PBKDF2 rounds used by fixtures that bypass config validation.
pub const TEST_KDF_ITERATIONS: u32 = 1_000;

/// A deterministic master key built from one repeated byte.
pub fn master_key(byte: u8) -> MasterKey {
    MasterKey::from_bytes(&[byte; 32]).unwrap()
}

/// Everything needed to reopen the same on-disk vault.
pub struct FileVault {
    pub manager: VaultManager,
    pub events: Arc<BroadcastEventBus>,
    pub orgs: Arc<StaticOrgDirectory>,
}

/// Open a file-backed vault with a ledger anchor and an event bus under `dir`.
pub async fn open_file_vault(dir: &Path, key_byte: u8) -> FileVault {
    let store = FileVaultStore::open(&dir.join("data")).await.unwrap();
    let ledger = FileLedger::open(&dir.join("ledger")).await.unwrap();
    let cipher =
        EnvelopeCipher::with_iterations(master_key(key_byte), TEST_KDF_ITERATIONS).unwrap();
    let events = Arc::new(BroadcastEventBus::new(64));
    let orgs = Arc::new(StaticOrgDirectory::new());

    let manager = VaultManager::builder(Arc::new(store), Arc::new(cipher))
        .with_anchor(Arc::new(LedgerAnchor::new(ledger)))
        .with_events(events.clone())
        .with_org_directory(orgs.clone())
        .build();

    FileVault {
        manager,
        events,
        orgs,
    }
}

/// A config file for CLI tests plus the env var holding its master key.
pub struct CliFixture {
    pub config_path: PathBuf,
    pub key_var: String,
}

/// Write a config under `dir` whose master key is read from a per-test
/// environment variable, and set that variable.
pub fn cli_fixture(dir: &Path, key_byte: u8) -> CliFixture {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let key_var = format!(
        "VK_IT_MASTER_KEY_{}_{}",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    );
    std::env::set_var(&key_var, master_key(key_byte).to_hex().as_str());

    let mut config = VaultConfig::default();
    config.master_key.env_var = key_var.clone();
    config.master_key.allow_ephemeral = false;
    config.storage.data_dir = Some(dir.join("data"));
    config.integrity.enabled = true;
    config.integrity.ledger_dir = Some(dir.join("ledger"));

    let config_path = dir.join("config.json5");
    config.save(&config_path).unwrap();

    CliFixture {
        config_path,
        key_var,
    }
}
