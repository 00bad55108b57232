//! Request validation. Runs before any access check or cryptographic work.

use vaultkeeper_core::config::LimitsConfig;

use crate::error::{Result, SecretError};
use crate::types::{
    CreateSecretParams, ShareParams, UpdateSecretParams, META_DEK_ENCRYPTED, META_KEK_SALT,
    META_NONCE,
};

/// Allowed rotation window, in days.
pub const MIN_ROTATION_DAYS: u32 = 1;
pub const MAX_ROTATION_DAYS: u32 = 365;

/// Validate a create payload.
///
/// An `expires_at` in the past is accepted; the item is simply unreadable.
pub fn validate_create(params: &CreateSecretParams, limits: &LimitsConfig) -> Result<()> {
    validate_name(&params.name, limits)?;
    validate_value(params.value.len(), limits)?;
    validate_tags(&params.tags, limits)?;
    validate_metadata_keys(params.metadata.keys())?;
    validate_rotation(params.rotation_enabled, params.rotation_days)
}

/// Validate an update payload against the item's current rotation settings.
pub fn validate_update(
    params: &UpdateSecretParams,
    current_rotation_enabled: bool,
    current_rotation_days: Option<u32>,
    limits: &LimitsConfig,
) -> Result<()> {
    if let Some(name) = &params.name {
        validate_name(name, limits)?;
    }
    if let Some(value) = &params.value {
        validate_value(value.len(), limits)?;
    }
    if let Some(tags) = &params.tags {
        validate_tags(tags, limits)?;
    }
    if let Some(metadata) = &params.metadata {
        validate_metadata_keys(metadata.keys())?;
    }

    let enabled = params.rotation_enabled.unwrap_or(current_rotation_enabled);
    let days = params.rotation_days.unwrap_or(current_rotation_days);
    validate_rotation(enabled, days)
}

/// A share must name exactly one target.
///
/// A past `expires_at` is accepted and yields a grant that never resolves.
pub fn validate_share(params: &ShareParams, owner_user_id: &str) -> Result<()> {
    match (&params.shared_with_user_id, &params.shared_with_org_id) {
        (Some(_), Some(_)) => {
            return Err(SecretError::validation(
                "specify either shared_with_user_id or shared_with_org_id, not both",
            ))
        }
        (None, None) => {
            return Err(SecretError::validation(
                "one of shared_with_user_id or shared_with_org_id is required",
            ))
        }
        (Some(user), None) => {
            if user.trim().is_empty() {
                return Err(SecretError::validation("shared_with_user_id must not be empty"));
            }
            if user == owner_user_id {
                return Err(SecretError::validation("cannot share a secret with yourself"));
            }
        }
        (None, Some(org)) => {
            if org.trim().is_empty() {
                return Err(SecretError::validation("shared_with_org_id must not be empty"));
            }
        }
    }
    Ok(())
}

fn validate_name(name: &str, limits: &LimitsConfig) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(SecretError::validation("name is required"));
    }
    if trimmed.chars().count() > limits.max_name_len {
        return Err(SecretError::validation(format!(
            "name exceeds maximum length of {} characters",
            limits.max_name_len
        )));
    }
    Ok(())
}

fn validate_value(len: usize, limits: &LimitsConfig) -> Result<()> {
    if len == 0 {
        return Err(SecretError::validation("value must not be empty"));
    }
    if len > limits.max_value_bytes {
        return Err(SecretError::validation(format!(
            "value exceeds maximum size of {} bytes",
            limits.max_value_bytes
        )));
    }
    Ok(())
}

fn validate_tags(tags: &[String], limits: &LimitsConfig) -> Result<()> {
    if tags.len() > limits.max_tags {
        return Err(SecretError::validation(format!(
            "at most {} tags allowed, got {}",
            limits.max_tags,
            tags.len()
        )));
    }
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(SecretError::validation("tags must not be empty"));
    }
    Ok(())
}

fn validate_metadata_keys<'a>(mut keys: impl Iterator<Item = &'a String>) -> Result<()> {
    if let Some(key) =
        keys.find(|k| [META_DEK_ENCRYPTED, META_KEK_SALT, META_NONCE].contains(&k.as_str()))
    {
        return Err(SecretError::validation(format!(
            "metadata key '{key}' is reserved"
        )));
    }
    Ok(())
}

fn validate_rotation(enabled: bool, days: Option<u32>) -> Result<()> {
    if !enabled {
        return Ok(());
    }
    match days {
        Some(d) if (MIN_ROTATION_DAYS..=MAX_ROTATION_DAYS).contains(&d) => Ok(()),
        Some(d) => Err(SecretError::validation(format!(
            "rotation_days must be between {MIN_ROTATION_DAYS} and {MAX_ROTATION_DAYS}, got {d}"
        ))),
        None => Err(SecretError::validation(
            "rotation_days is required when rotation is enabled",
        )),
    }
}
