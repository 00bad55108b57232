//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Minimum PBKDF2 iteration count accepted for per-user KEK derivation.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Main Vaultkeeper configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Key derivation settings.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Master key source.
    #[serde(default)]
    pub master_key: MasterKeyConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External integrity ledger.
    #[serde(default)]
    pub integrity: IntegrityConfig,

    /// Event bus settings.
    #[serde(default)]
    pub events: EventsConfig,

    /// Request validation limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Key derivation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iterations for KEK derivation.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

fn default_kdf_iterations() -> u32 {
    MIN_KDF_ITERATIONS
}

/// Where the master key comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterKeyConfig {
    /// Environment variable holding the hex-encoded key.
    #[serde(default = "default_master_key_env")]
    pub env_var: String,

    /// Optional file holding the hex-encoded key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,

    /// Generate a throwaway key when no source is available.
    #[serde(default = "default_true")]
    pub allow_ephemeral: bool,
}

impl Default for MasterKeyConfig {
    fn default() -> Self {
        Self {
            env_var: default_master_key_env(),
            key_file: None,
            allow_ephemeral: true,
        }
    }
}

fn default_master_key_env() -> String {
    crate::env::vars::VAULTKEEPER_MASTER_KEY.to_string()
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for the file-backed store. Defaults to `~/.vaultkeeper/data`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Integrity ledger configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrityConfig {
    /// Commit content hashes to the ledger.
    #[serde(default)]
    pub enabled: bool,

    /// Ledger directory. Defaults to `~/.vaultkeeper/ledger`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_dir: Option<PathBuf>,
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Publish lifecycle events.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Broadcast channel capacity.
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_event_capacity(),
        }
    }
}

fn default_event_capacity() -> usize {
    256
}

/// Limits applied when validating create/update payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of tags per secret.
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    /// Maximum secret name length in characters.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,

    /// Maximum plaintext size in bytes.
    #[serde(default = "default_max_value_bytes")]
    pub max_value_bytes: usize,

    /// Window used by stats to flag secrets that expire soon.
    #[serde(default = "default_expiring_soon_days")]
    pub expiring_soon_days: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_tags: default_max_tags(),
            max_name_len: default_max_name_len(),
            max_value_bytes: default_max_value_bytes(),
            expiring_soon_days: default_expiring_soon_days(),
        }
    }
}

fn default_max_tags() -> usize {
    10
}

fn default_max_name_len() -> usize {
    255
}

fn default_max_value_bytes() -> usize {
    64 * 1024
}

fn default_expiring_soon_days() -> u32 {
    7
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

fn default_true() -> bool {
    true
}
