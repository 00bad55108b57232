//! Integrity anchoring.
//!
//! An [`IntegrityAnchor`] commits a content hash of a secret to an external
//! ledger and later checks it. Both operations are best-effort: ledger
//! failures surface as `None` / `false`, never as errors.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use vaultkeeper_core::secret::constant_time_eq;

use crate::error::{Result, SecretError};

/// Commits and verifies content hashes.
#[async_trait]
pub trait IntegrityAnchor: Send + Sync {
    /// Commit `hash` for `vault_id`. Returns the ledger reference, or `None`
    /// if the ledger could not be reached.
    async fn commit(&self, vault_id: &str, hash: &str) -> Option<String>;

    /// True only if `reference` resolves to a record for this `vault_id`
    /// and `hash`.
    async fn verify(&self, vault_id: &str, hash: &str, reference: &str) -> bool;
}

/// Append-only external ledger.
#[async_trait]
pub trait IntegrityLedger: Send + Sync {
    /// Store `data` and return a reference to it.
    async fn commit(&self, data: &[u8]) -> Result<String>;

    /// Fetch previously committed data.
    async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>>;
}

/// Record written to the ledger for each commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnchorRecord {
    vault_id: String,
    hash: String,
    committed_at: DateTime<Utc>,
}

/// [`IntegrityAnchor`] backed by any [`IntegrityLedger`].
pub struct LedgerAnchor<L> {
    ledger: L,
}

impl<L: IntegrityLedger> LedgerAnchor<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

#[async_trait]
impl<L: IntegrityLedger> IntegrityAnchor for LedgerAnchor<L> {
    async fn commit(&self, vault_id: &str, hash: &str) -> Option<String> {
        let record = AnchorRecord {
            vault_id: vault_id.to_string(),
            hash: hash.to_string(),
            committed_at: Utc::now(),
        };
        let data = match serde_json::to_vec(&record) {
            Ok(data) => data,
            Err(e) => {
                warn!(vault_id, error = %e, "failed to encode anchor record");
                return None;
            }
        };

        match self.ledger.commit(&data).await {
            Ok(reference) => {
                debug!(vault_id, reference = %reference, "committed integrity anchor");
                Some(reference)
            }
            Err(e) => {
                warn!(
                    vault_id,
                    error = %e,
                    "integrity ledger unavailable; continuing without anchor"
                );
                None
            }
        }
    }

    async fn verify(&self, vault_id: &str, hash: &str, reference: &str) -> bool {
        let data = match self.ledger.fetch(reference).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                warn!(vault_id, reference, "integrity anchor not found");
                return false;
            }
            Err(e) => {
                warn!(
                    vault_id,
                    reference,
                    error = %e,
                    "integrity ledger unavailable during verify"
                );
                return false;
            }
        };

        match serde_json::from_slice::<AnchorRecord>(&data) {
            Ok(record) => {
                record.vault_id == vault_id
                    && constant_time_eq(record.hash.as_bytes(), hash.as_bytes())
            }
            Err(e) => {
                warn!(vault_id, reference, error = %e, "malformed integrity anchor record");
                false
            }
        }
    }
}

/// In-memory ledger whose availability can be switched off.
pub struct InMemoryLedger {
    records: RwLock<HashMap<String, Vec<u8>>>,
    available: AtomicBool,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the ledger going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of committed records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SecretError::Persistence("integrity ledger unavailable".into()))
        }
    }
}

#[async_trait]
impl IntegrityLedger for InMemoryLedger {
    async fn commit(&self, data: &[u8]) -> Result<String> {
        self.check_available()?;
        let reference = content_reference(data);
        self.records
            .write()
            .await
            .insert(reference.clone(), data.to_vec());
        Ok(reference)
    }

    async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>> {
        self.check_available()?;
        Ok(self.records.read().await.get(reference).cloned())
    }
}

/// Content-addressed ledger stored as one JSON file per record.
pub struct FileLedger {
    dir: PathBuf,
}

impl FileLedger {
    pub async fn open(dir: &Path) -> Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn record_path(&self, reference: &str) -> Option<PathBuf> {
        // References are hex digests; anything else cannot name a record.
        if reference.is_empty() || !reference.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(self.dir.join(format!("{reference}.json")))
    }
}

#[async_trait]
impl IntegrityLedger for FileLedger {
    async fn commit(&self, data: &[u8]) -> Result<String> {
        let reference = content_reference(data);
        let path = self
            .record_path(&reference)
            .ok_or_else(|| SecretError::Persistence("invalid ledger reference".into()))?;
        if !tokio::fs::try_exists(&path).await? {
            let tmp_path = path.with_extension("tmp");
            tokio::fs::write(&tmp_path, data).await?;
            tokio::fs::rename(&tmp_path, &path).await?;
        }
        Ok(reference)
    }

    async fn fetch(&self, reference: &str) -> Result<Option<Vec<u8>>> {
        let Some(path) = self.record_path(reference) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn content_reference(data: &[u8]) -> String {
    vaultkeeper_core::id::sha256_hex(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_for_anchor;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_commit_and_verify() {
        let anchor = LedgerAnchor::new(InMemoryLedger::new());
        let hash = hash_for_anchor(b"hunter2");

        let reference = anchor.commit("v1", &hash).await.unwrap();
        assert!(anchor.verify("v1", &hash, &reference).await);
        assert!(!anchor.verify("v1", &hash_for_anchor(b"other"), &reference).await);
        assert!(!anchor.verify("v2", &hash, &reference).await);
        assert!(!anchor.verify("v1", &hash, "deadbeef").await);
    }

    #[tokio::test]
    async fn test_unavailable_ledger_degrades() {
        let anchor = LedgerAnchor::new(InMemoryLedger::new());
        assert!(anchor.ledger().is_empty().await);
        let hash = hash_for_anchor(b"hunter2");
        let reference = anchor.commit("v1", &hash).await.unwrap();
        assert_eq!(anchor.ledger().len().await, 1);

        anchor.ledger().set_available(false);
        assert!(anchor.commit("v1", &hash).await.is_none());
        assert_eq!(anchor.ledger().len().await, 1);
        assert!(!anchor.verify("v1", &hash, &reference).await);

        anchor.ledger().set_available(true);
        assert!(anchor.verify("v1", &hash, &reference).await);
    }

    #[tokio::test]
    async fn test_file_ledger_persists() {
        let tmp = TempDir::new().unwrap();
        let hash = hash_for_anchor(b"value");
        let reference = {
            let anchor = LedgerAnchor::new(FileLedger::open(tmp.path()).await.unwrap());
            anchor.commit("v1", &hash).await.unwrap()
        };

        let anchor = LedgerAnchor::new(FileLedger::open(tmp.path()).await.unwrap());
        assert!(anchor.verify("v1", &hash, &reference).await);
    }

    #[tokio::test]
    async fn test_file_ledger_rejects_path_references() {
        let tmp = TempDir::new().unwrap();
        let ledger = FileLedger::open(tmp.path()).await.unwrap();
        assert!(ledger.fetch("../etc/passwd").await.unwrap().is_none());
        assert!(ledger.fetch("").await.unwrap().is_none());
    }
}
