//! Envelope-encrypted secret storage for Vaultkeeper.
//!
//! Secrets are sealed with AES-256-GCM under a per-secret data key (DEK),
//! which is wrapped under a per-user key-encryption key (KEK) derived from
//! the process master key. [`VaultManager`] layers access control, sharing,
//! audit logging, integrity anchoring and lifecycle events on top.

pub mod access;
pub mod anchor;
pub mod audit;
pub mod crypto;
pub mod error;
pub mod events;
pub mod keychain;
pub mod manager;
pub mod store;
pub mod types;
pub mod validation;

pub use access::{OrgDirectory, StaticOrgDirectory};
pub use anchor::{FileLedger, InMemoryLedger, IntegrityAnchor, IntegrityLedger, LedgerAnchor};
pub use crypto::{EnvelopeCipher, MasterKey};
pub use error::{Result, SecretError};
pub use events::{BroadcastEventBus, EventBus, VaultEvent, VaultEventKind};
pub use keychain::{load_master_key, MasterKeySource};
pub use manager::{VaultManager, VaultManagerBuilder};
pub use store::{FileVaultStore, InMemoryVaultStore, VaultStore};
pub use types::{
    AccessAction, AccessLevel, AccessLogEntry, Caller, CreateSecretParams, DecryptedSecret,
    ListFilter, PermissionLevel, SecretProvider, SecretType, SecretView, ShareGrant, ShareParams,
    UpdateSecretParams, VaultItem, VaultItemSummary, VaultStats,
};
