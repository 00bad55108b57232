//! Access log recording.
//!
//! Every operation outcome is written through the store as an
//! [`AccessLogEntry`] and mirrored to the `vaultkeeper::audit` tracing target.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::VaultStore;
use crate::types::{AccessAction, AccessLogEntry, Caller};

/// Writes access log entries.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn VaultStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn VaultStore>) -> Self {
        Self { store }
    }

    /// Record the outcome of `action` on `vault_id`.
    ///
    /// A failure to write the entry is logged and otherwise ignored so it
    /// never replaces the operation's own result.
    pub async fn record<T>(
        &self,
        vault_id: &str,
        caller: &Caller,
        action: AccessAction,
        outcome: &Result<T>,
    ) {
        let entry = AccessLogEntry {
            log_id: vaultkeeper_core::id::uuid(),
            vault_id: vault_id.to_string(),
            user_id: caller.user_id.clone(),
            action,
            success: outcome.is_ok(),
            error_message: outcome.as_ref().err().map(ToString::to_string),
            ip_address: caller.ip_address.clone(),
            user_agent: caller.user_agent.clone(),
            timestamp: Utc::now(),
        };

        match &entry.error_message {
            None => info!(
                target: "vaultkeeper::audit",
                vault_id = %entry.vault_id,
                user_id = %entry.user_id,
                action = %entry.action,
                success = true,
            ),
            Some(error) => warn!(
                target: "vaultkeeper::audit",
                vault_id = %entry.vault_id,
                user_id = %entry.user_id,
                action = %entry.action,
                success = false,
                error = %error,
            ),
        }

        if let Err(e) = self.store.create_access_log(&entry).await {
            warn!(
                vault_id = %entry.vault_id,
                action = %entry.action,
                error = %e,
                "failed to write access log entry"
            );
        }
    }
}
