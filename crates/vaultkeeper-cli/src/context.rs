//! Wiring a [`VaultManager`] from configuration.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, warn};
use vaultkeeper_core::VaultConfig;
use vaultkeeper_secrets::{
    load_master_key, BroadcastEventBus, EnvelopeCipher, FileLedger, FileVaultStore, LedgerAnchor,
    MasterKeySource, VaultManager,
};

/// Everything a command needs to operate on the vault.
pub struct VaultContext {
    pub config: VaultConfig,
    pub manager: VaultManager,
    pub key_source: MasterKeySource,
}

impl VaultContext {
    /// Load and validate the config, then open the vault it describes.
    pub async fn open(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = VaultConfig::load_or_default(config_path)?;
        config.validate()?;
        Self::from_config(config).await
    }

    /// Open the vault described by an already-validated config.
    pub async fn from_config(config: VaultConfig) -> anyhow::Result<Self> {
        let (master_key, key_source) = load_master_key(&config.master_key)?;
        if key_source == MasterKeySource::Ephemeral {
            warn!(
                "secrets written now will be unreadable on the next run; \
                 see `vaultkeeper keygen`"
            );
        }
        let cipher = EnvelopeCipher::with_iterations(master_key, config.crypto.kdf_iterations)?;

        let data_dir = config.data_dir()?;
        let store = FileVaultStore::open(&data_dir).await?;
        debug!(data_dir = %data_dir.display(), key_source = %key_source, "opened vault");

        let mut builder = VaultManager::builder(Arc::new(store), Arc::new(cipher))
            .with_limits(config.limits.clone());

        if config.integrity.enabled {
            let ledger = FileLedger::open(&config.ledger_dir()?).await?;
            builder = builder.with_anchor(Arc::new(LedgerAnchor::new(ledger)));
        }
        if config.events.enabled {
            builder = builder.with_events(Arc::new(BroadcastEventBus::new(config.events.capacity)));
        }

        Ok(Self {
            manager: builder.build(),
            config,
            key_source,
        })
    }
}
