//! Lifecycle events.
//!
//! Events carry identifiers and classification only. Plaintext, keys and
//! ciphertext never appear in an event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use crate::error::{Result, SecretError};
use crate::types::SecretType;

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultEventKind {
    #[serde(rename = "secret.created")]
    Created,
    #[serde(rename = "secret.accessed")]
    Accessed,
    #[serde(rename = "secret.updated")]
    Updated,
    #[serde(rename = "secret.deleted")]
    Deleted,
    #[serde(rename = "secret.shared")]
    Shared,
    #[serde(rename = "secret.rotated")]
    Rotated,
}

impl VaultEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VaultEventKind::Created => "secret.created",
            VaultEventKind::Accessed => "secret.accessed",
            VaultEventKind::Updated => "secret.updated",
            VaultEventKind::Deleted => "secret.deleted",
            VaultEventKind::Shared => "secret.shared",
            VaultEventKind::Rotated => "secret.rotated",
        }
    }
}

impl std::fmt::Display for VaultEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultEvent {
    #[serde(rename = "event")]
    pub kind: VaultEventKind,
    pub vault_id: String,
    /// The acting user.
    pub user_id: String,
    pub secret_type: SecretType,
    pub timestamp: DateTime<Utc>,
    /// Extra non-sensitive fields, e.g. the new version or the share target.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub details: Value,
}

impl VaultEvent {
    pub fn new(
        kind: VaultEventKind,
        vault_id: impl Into<String>,
        user_id: impl Into<String>,
        secret_type: SecretType,
    ) -> Self {
        Self {
            kind,
            vault_id: vault_id.into(),
            user_id: user_id.into(),
            secret_type,
            timestamp: Utc::now(),
            details: Value::Null,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Fire-and-forget event sink.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: VaultEvent) -> Result<()>;
}

/// Event bus over a tokio broadcast channel.
pub struct BroadcastEventBus {
    tx: broadcast::Sender<VaultEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<VaultEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: VaultEvent) -> Result<()> {
        if self.tx.receiver_count() == 0 {
            trace!(event = %event.kind, "no event subscribers");
            return Ok(());
        }
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|e| SecretError::Persistence(format!("event publish failed: {e}")))
    }
}
