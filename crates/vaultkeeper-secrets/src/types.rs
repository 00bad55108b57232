//! Core types for secret management.
//!
//! Persisted records ([`VaultItem`], [`ShareGrant`], [`AccessLogEntry`]),
//! request payloads, and the decrypted in-memory view of a secret.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use vaultkeeper_core::SecretString;

use crate::crypto::{EncryptedValue, RotatedValue};
use crate::error::{Result, SecretError};

/// Encryption scheme label stored on every item.
pub const ENCRYPTION_METHOD: &str = "AES-256-GCM/PBKDF2-SHA256-KEK";

/// Metadata keys reserved for encryption parameters.
pub const META_DEK_ENCRYPTED: &str = "dek_encrypted";
pub const META_KEK_SALT: &str = "kek_salt";
pub const META_NONCE: &str = "nonce";

const RESERVED_METADATA_KEYS: [&str; 3] = [META_DEK_ENCRYPTED, META_KEK_SALT, META_NONCE];

/// Kind of secret material.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    ApiKey,
    DatabaseCredential,
    PrivateKey,
    Token,
    Password,
    Certificate,
    SshKey,
    Webhook,
    #[default]
    Other,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::ApiKey => "api_key",
            SecretType::DatabaseCredential => "database_credential",
            SecretType::PrivateKey => "private_key",
            SecretType::Token => "token",
            SecretType::Password => "password",
            SecretType::Certificate => "certificate",
            SecretType::SshKey => "ssh_key",
            SecretType::Webhook => "webhook",
            SecretType::Other => "other",
        }
    }
}

impl fmt::Display for SecretType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecretType {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_lowercase()))
            .map_err(|_| SecretError::validation(format!("unknown secret type: {s}")))
    }
}

/// Service a secret belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretProvider {
    Openai,
    Anthropic,
    Aws,
    Gcp,
    Azure,
    Github,
    Stripe,
    Postgres,
    Mysql,
    Mongodb,
    Redis,
    Ethereum,
    #[default]
    Custom,
}

impl SecretProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretProvider::Openai => "openai",
            SecretProvider::Anthropic => "anthropic",
            SecretProvider::Aws => "aws",
            SecretProvider::Gcp => "gcp",
            SecretProvider::Azure => "azure",
            SecretProvider::Github => "github",
            SecretProvider::Stripe => "stripe",
            SecretProvider::Postgres => "postgres",
            SecretProvider::Mysql => "mysql",
            SecretProvider::Mongodb => "mongodb",
            SecretProvider::Redis => "redis",
            SecretProvider::Ethereum => "ethereum",
            SecretProvider::Custom => "custom",
        }
    }
}

impl fmt::Display for SecretProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecretProvider {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_value(Value::String(s.to_lowercase()))
            .map_err(|_| SecretError::validation(format!("unknown provider: {s}")))
    }
}

/// Permission carried by a share grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Read,
    ReadWrite,
}

impl std::str::FromStr for PermissionLevel {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "read" => Ok(PermissionLevel::Read),
            "read_write" => Ok(PermissionLevel::ReadWrite),
            _ => Err(SecretError::validation(format!("unknown permission level: {s}"))),
        }
    }
}

/// Effective access a caller has on one secret.
///
/// Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    None,
    Read,
    ReadWrite,
    Owner,
}

impl AccessLevel {
    pub fn can_read(&self) -> bool {
        *self >= AccessLevel::Read
    }

    pub fn can_write(&self) -> bool {
        *self >= AccessLevel::ReadWrite
    }

    /// Delete, share and revoke are owner-only.
    pub fn can_manage(&self) -> bool {
        *self == AccessLevel::Owner
    }
}

impl From<PermissionLevel> for AccessLevel {
    fn from(level: PermissionLevel) -> Self {
        match level {
            PermissionLevel::Read => AccessLevel::Read,
            PermissionLevel::ReadWrite => AccessLevel::ReadWrite,
        }
    }
}

/// Operation recorded in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessAction {
    Create,
    Read,
    Update,
    Rotate,
    Delete,
    Share,
    RevokeShare,
    Erase,
}

impl AccessAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessAction::Create => "CREATE",
            AccessAction::Read => "READ",
            AccessAction::Update => "UPDATE",
            AccessAction::Rotate => "ROTATE",
            AccessAction::Delete => "DELETE",
            AccessAction::Share => "SHARE",
            AccessAction::RevokeShare => "REVOKE_SHARE",
            AccessAction::Erase => "ERASE",
        }
    }
}

impl fmt::Display for AccessAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted secret record. `encrypted_value` is always cipher output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultItem {
    pub vault_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    pub secret_type: SecretType,
    pub provider: SecretProvider,

    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// User metadata plus the reserved encryption parameter keys.
    #[serde(default)]
    pub metadata: Map<String, Value>,

    /// AES-256-GCM ciphertext, base64.
    pub encrypted_value: String,
    pub encryption_method: String,

    pub version: u32,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rotation_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_days: Option<u32>,

    #[serde(default)]
    pub access_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_reference: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VaultItem {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |exp| now > exp)
    }

    /// Rotation is due once `rotation_days` have passed since the last update.
    pub fn needs_rotation(&self, now: DateTime<Utc>) -> bool {
        match (self.rotation_enabled, self.rotation_days) {
            (true, Some(days)) => now >= self.updated_at + Duration::days(i64::from(days)),
            _ => false,
        }
    }

    /// Encryption parameters stored in `metadata`.
    pub fn encryption_params(&self) -> Result<EncryptionParams> {
        EncryptionParams::from_metadata(&self.metadata)
    }

    /// Metadata with the reserved encryption keys removed.
    pub fn public_metadata(&self) -> Map<String, Value> {
        self.metadata
            .iter()
            .filter(|(k, _)| !RESERVED_METADATA_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Apply a change set in place.
    ///
    /// Metadata is merged: keys in `changes.metadata` overwrite, all other
    /// keys are kept.
    pub fn apply(&mut self, changes: &VaultItemChanges) {
        if let Some(name) = &changes.name {
            self.name = name.clone();
        }
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(tags) = &changes.tags {
            self.tags = tags.clone();
        }
        if let Some(metadata) = &changes.metadata {
            for (k, v) in metadata {
                self.metadata.insert(k.clone(), v.clone());
            }
        }
        if let Some(value) = &changes.encrypted_value {
            self.encrypted_value = value.clone();
        }
        if let Some(version) = changes.version {
            self.version = version;
        }
        if let Some(expires_at) = changes.expires_at {
            self.expires_at = expires_at;
        }
        if let Some(enabled) = changes.rotation_enabled {
            self.rotation_enabled = enabled;
        }
        if let Some(days) = changes.rotation_days {
            self.rotation_days = days;
        }
        if let Some(reference) = &changes.blockchain_reference {
            self.blockchain_reference = reference.clone();
        }
        self.updated_at = changes.updated_at;
    }
}

/// Partial update passed to the persistence collaborator.
///
/// `Some(None)` on a double option clears the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultItemChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Map<String, Value>>,
    pub encrypted_value: Option<String>,
    pub version: Option<u32>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub rotation_enabled: Option<bool>,
    pub rotation_days: Option<Option<u32>>,
    pub blockchain_reference: Option<Option<String>>,
    pub updated_at: DateTime<Utc>,
}

impl VaultItemChanges {
    /// An empty change set stamped with `updated_at`.
    pub fn at(updated_at: DateTime<Utc>) -> Self {
        Self {
            name: None,
            description: None,
            tags: None,
            metadata: None,
            encrypted_value: None,
            version: None,
            expires_at: None,
            rotation_enabled: None,
            rotation_days: None,
            blockchain_reference: None,
            updated_at,
        }
    }
}

/// Encryption parameters in their persisted (text) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionParams {
    /// Wrapped DEK, base64.
    pub dek_encrypted: String,
    /// KEK salt, hex.
    pub kek_salt: String,
    /// Value nonce, hex.
    pub nonce: String,
}

impl EncryptionParams {
    pub fn from_encrypted(value: &EncryptedValue) -> Self {
        Self {
            dek_encrypted: BASE64.encode(&value.dek_encrypted),
            kek_salt: hex::encode(&value.kek_salt),
            nonce: hex::encode(value.nonce),
        }
    }

    pub fn from_rotated(value: &RotatedValue, kek_salt: &str) -> Self {
        Self {
            dek_encrypted: BASE64.encode(&value.dek_encrypted),
            kek_salt: kek_salt.to_string(),
            nonce: hex::encode(value.nonce),
        }
    }

    pub fn from_metadata(metadata: &Map<String, Value>) -> Result<Self> {
        let field = |key: &str| {
            metadata
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    SecretError::Persistence(format!("missing encryption parameter: {key}"))
                })
        };
        Ok(Self {
            dek_encrypted: field(META_DEK_ENCRYPTED)?,
            kek_salt: field(META_KEK_SALT)?,
            nonce: field(META_NONCE)?,
        })
    }

    /// Metadata entries carrying these parameters.
    pub fn to_metadata(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(META_DEK_ENCRYPTED.into(), Value::String(self.dek_encrypted.clone()));
        map.insert(META_KEK_SALT.into(), Value::String(self.kek_salt.clone()));
        map.insert(META_NONCE.into(), Value::String(self.nonce.clone()));
        map
    }

    /// Raw bytes `(dek_encrypted, kek_salt, nonce)`.
    ///
    /// Malformed encodings are reported as a decryption failure.
    pub fn decode(&self) -> Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        let dek = BASE64
            .decode(&self.dek_encrypted)
            .map_err(|_| SecretError::DecryptionFailed)?;
        let salt = hex::decode(&self.kek_salt).map_err(|_| SecretError::DecryptionFailed)?;
        let nonce = hex::decode(&self.nonce).map_err(|_| SecretError::DecryptionFailed)?;
        Ok((dek, salt, nonce))
    }
}

/// Encode ciphertext for `encrypted_value`.
pub fn encode_ciphertext(ciphertext: &[u8]) -> String {
    BASE64.encode(ciphertext)
}

/// Decode `encrypted_value`. Malformed input is a decryption failure.
pub fn decode_ciphertext(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|_| SecretError::DecryptionFailed)
}

/// Metadata-only view of a secret, safe to log or serialize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultItemSummary {
    pub vault_id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub secret_type: SecretType,
    pub provider: SecretProvider,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
    pub version: u32,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub rotation_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_days: Option<u32>,
    pub access_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blockchain_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&VaultItem> for VaultItemSummary {
    fn from(item: &VaultItem) -> Self {
        Self {
            vault_id: item.vault_id.clone(),
            user_id: item.user_id.clone(),
            organization_id: item.organization_id.clone(),
            secret_type: item.secret_type,
            provider: item.provider,
            name: item.name.clone(),
            description: item.description.clone(),
            tags: item.tags.clone(),
            metadata: item.public_metadata(),
            version: item.version,
            is_active: item.is_active,
            expires_at: item.expires_at,
            rotation_enabled: item.rotation_enabled,
            rotation_days: item.rotation_days,
            access_count: item.access_count,
            last_accessed_at: item.last_accessed_at,
            blockchain_reference: item.blockchain_reference.clone(),
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

/// A decrypted secret held in memory.
///
/// Wraps `SecretString` so the plaintext is zeroed on drop. Debug and Display
/// both emit `[REDACTED]` to prevent accidental logging.
pub struct DecryptedSecret {
    inner: SecretString,
}

impl DecryptedSecret {
    /// Create a new decrypted secret from raw plaintext.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: SecretString::new(value),
        }
    }

    /// Expose the plaintext value. Use sparingly.
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }
}

impl From<SecretString> for DecryptedSecret {
    fn from(inner: SecretString) -> Self {
        Self { inner }
    }
}

impl fmt::Debug for DecryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for DecryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Result of a successful read.
#[derive(Debug)]
pub struct SecretView {
    pub item: VaultItemSummary,
    /// Present when decryption was requested.
    pub value: Option<DecryptedSecret>,
    /// How the caller was authorized.
    pub access: AccessLevel,
    /// Integrity check outcome; `None` when no check was attempted.
    pub verified: Option<bool>,
}

/// Parameters for creating a new secret.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSecretParams {
    pub name: String,
    pub value: SecretString,
    #[serde(default)]
    pub secret_type: SecretType,
    #[serde(default)]
    pub provider: SecretProvider,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rotation_enabled: bool,
    #[serde(default)]
    pub rotation_days: Option<u32>,
}

impl CreateSecretParams {
    /// Minimal payload: a name and a value.
    pub fn new(name: impl Into<String>, value: impl Into<SecretString>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, secret_type: SecretType) -> Self {
        self.secret_type = secret_type;
        self
    }

    pub fn with_provider(mut self, provider: SecretProvider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_rotation(mut self, days: u32) -> Self {
        self.rotation_enabled = true;
        self.rotation_days = Some(days);
        self
    }
}

/// Parameters for updating a secret. `None` leaves a field untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSecretParams {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    /// New plaintext; triggers re-encryption and a version bump.
    #[serde(default)]
    pub value: Option<SecretString>,
    #[serde(default)]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub rotation_enabled: Option<bool>,
    #[serde(default)]
    pub rotation_days: Option<Option<u32>>,
}

impl UpdateSecretParams {
    pub fn value(value: impl Into<SecretString>) -> Self {
        Self {
            value: Some(value.into()),
            ..Default::default()
        }
    }
}

/// A delegation of access to one secret.
///
/// Exactly one of `shared_with_user_id` / `shared_with_org_id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareGrant {
    pub share_id: String,
    pub vault_id: String,
    pub owner_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_with_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_with_org_id: Option<String>,
    pub permission_level: PermissionLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl ShareGrant {
    /// Active and not past its expiry.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }

    /// Whether the grant names this user directly or one of their orgs.
    pub fn targets(&self, user_id: &str, org_ids: &[String]) -> bool {
        match (&self.shared_with_user_id, &self.shared_with_org_id) {
            (Some(uid), _) => uid == user_id,
            (None, Some(oid)) => org_ids.iter().any(|o| o == oid),
            (None, None) => false,
        }
    }
}

/// Parameters for sharing a secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ShareParams {
    #[serde(default)]
    pub shared_with_user_id: Option<String>,
    #[serde(default)]
    pub shared_with_org_id: Option<String>,
    pub permission_level: PermissionLevel,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShareParams {
    pub fn with_user(user_id: impl Into<String>, permission_level: PermissionLevel) -> Self {
        Self {
            shared_with_user_id: Some(user_id.into()),
            shared_with_org_id: None,
            permission_level,
            expires_at: None,
        }
    }

    pub fn with_org(org_id: impl Into<String>, permission_level: PermissionLevel) -> Self {
        Self {
            shared_with_user_id: None,
            shared_with_org_id: Some(org_id.into()),
            permission_level,
            expires_at: None,
        }
    }

    pub fn expiring(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Immutable record of one attempted operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub log_id: String,
    pub vault_id: String,
    pub user_id: String,
    pub action: AccessAction,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Caller {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }
}

impl From<&str> for Caller {
    fn from(user_id: &str) -> Self {
        Self::new(user_id)
    }
}

/// Filter for listing secrets.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub secret_type: Option<SecretType>,
    pub provider: Option<SecretProvider>,
    pub tag: Option<String>,
    pub include_inactive: bool,
}

impl ListFilter {
    pub fn matches(&self, item: &VaultItem) -> bool {
        (self.include_inactive || item.is_active)
            && self.secret_type.map_or(true, |t| t == item.secret_type)
            && self.provider.map_or(true, |p| p == item.provider)
            && self
                .tag
                .as_ref()
                .map_or(true, |tag| item.tags.iter().any(|t| t == tag))
    }
}

/// Aggregate counts for one user's secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStats {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub expired: u64,
    pub expiring_soon: u64,
    pub due_for_rotation: u64,
    pub shared: u64,
    pub total_accesses: u64,
    pub by_type: std::collections::BTreeMap<String, u64>,
    pub by_provider: std::collections::BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> VaultItem {
        let now = Utc::now();
        let mut metadata = Map::new();
        metadata.insert("env".into(), Value::String("prod".into()));
        metadata.insert(META_NONCE.into(), Value::String("00".into()));
        metadata.insert(META_KEK_SALT.into(), Value::String("11".into()));
        metadata.insert(META_DEK_ENCRYPTED.into(), Value::String("AA==".into()));
        VaultItem {
            vault_id: "v1".into(),
            user_id: "u1".into(),
            organization_id: None,
            secret_type: SecretType::DatabaseCredential,
            provider: SecretProvider::Postgres,
            name: "DB password".into(),
            description: None,
            tags: vec!["prod".into()],
            metadata,
            encrypted_value: "AAAA".into(),
            encryption_method: ENCRYPTION_METHOD.into(),
            version: 1,
            is_active: true,
            expires_at: None,
            rotation_enabled: false,
            rotation_days: None,
            access_count: 0,
            last_accessed_at: None,
            blockchain_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_decrypted_secret_redacted() {
        let secret = DecryptedSecret::new("super-secret");
        assert_eq!(format!("{:?}", secret), "[REDACTED]");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(secret.expose(), "super-secret");
    }

    #[test]
    fn test_access_level_ordering() {
        assert!(AccessLevel::Owner.can_manage());
        assert!(!AccessLevel::ReadWrite.can_manage());
        assert!(AccessLevel::ReadWrite.can_write());
        assert!(!AccessLevel::Read.can_write());
        assert!(AccessLevel::Read.can_read());
        assert!(!AccessLevel::None.can_read());
        assert_eq!(AccessLevel::from(PermissionLevel::Read), AccessLevel::Read);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("api_key".parse::<SecretType>().unwrap(), SecretType::ApiKey);
        assert_eq!("GitHub".parse::<SecretProvider>().unwrap(), SecretProvider::Github);
        assert_eq!(
            "read-write".parse::<PermissionLevel>().unwrap(),
            PermissionLevel::ReadWrite
        );
        assert!("bogus".parse::<SecretType>().is_err());
        assert_eq!(
            serde_json::to_string(&AccessAction::RevokeShare).unwrap(),
            "\"REVOKE_SHARE\""
        );
    }

    #[test]
    fn test_public_metadata_hides_encryption_params() {
        let item = sample_item();
        let public = item.public_metadata();
        assert_eq!(public.len(), 1);
        assert!(public.contains_key("env"));

        let summary = VaultItemSummary::from(&item);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(!json.contains(META_KEK_SALT));
        assert!(!json.contains("encrypted_value"));
    }

    #[test]
    fn test_encryption_params_from_metadata() {
        let item = sample_item();
        let params = item.encryption_params().unwrap();
        assert_eq!(params.nonce, "00");
        assert_eq!(params.to_metadata().len(), 3);

        let mut broken = item.clone();
        broken.metadata.remove(META_NONCE);
        assert!(matches!(
            broken.encryption_params(),
            Err(SecretError::Persistence(_))
        ));
    }

    #[test]
    fn test_apply_merges_metadata() {
        let mut item = sample_item();
        let mut changes = VaultItemChanges::at(Utc::now());
        let mut meta = Map::new();
        meta.insert(META_NONCE.into(), Value::String("ff".into()));
        meta.insert("team".into(), Value::String("payments".into()));
        changes.metadata = Some(meta);
        changes.description = Some(Some("primary db".into()));
        item.apply(&changes);

        assert_eq!(item.metadata["nonce"], "ff");
        assert_eq!(item.metadata["env"], "prod");
        assert_eq!(item.metadata["team"], "payments");
        assert_eq!(item.metadata[META_KEK_SALT], "11");
        assert_eq!(item.description.as_deref(), Some("primary db"));
    }

    #[test]
    fn test_expiry_and_rotation_checks() {
        let mut item = sample_item();
        let now = Utc::now();
        assert!(!item.is_expired(now));
        item.expires_at = Some(now - Duration::seconds(1));
        assert!(item.is_expired(now));

        item.rotation_enabled = true;
        item.rotation_days = Some(30);
        assert!(!item.needs_rotation(now));
        item.updated_at = now - Duration::days(31);
        assert!(item.needs_rotation(now));
    }

    #[test]
    fn test_share_grant_validity_and_targeting() {
        let now = Utc::now();
        let mut grant = ShareGrant {
            share_id: "s1".into(),
            vault_id: "v1".into(),
            owner_user_id: "u1".into(),
            shared_with_user_id: None,
            shared_with_org_id: Some("org-a".into()),
            permission_level: PermissionLevel::Read,
            expires_at: None,
            is_active: true,
            created_at: now,
        };
        assert!(grant.is_valid_at(now));
        assert!(grant.targets("u2", &["org-a".to_string()]));
        assert!(!grant.targets("u2", &[]));

        grant.expires_at = Some(now - Duration::minutes(1));
        assert!(!grant.is_valid_at(now));
    }

    #[test]
    fn test_list_filter() {
        let item = sample_item();
        assert!(ListFilter::default().matches(&item));
        let by_tag = ListFilter {
            tag: Some("staging".into()),
            ..Default::default()
        };
        assert!(!by_tag.matches(&item));

        let mut inactive = item.clone();
        inactive.is_active = false;
        assert!(!ListFilter::default().matches(&inactive));
        assert!(ListFilter {
            include_inactive: true,
            ..Default::default()
        }
        .matches(&inactive));
    }
}
