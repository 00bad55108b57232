//! Path resolution utilities.

use crate::error::ConfigError;
use std::path::PathBuf;

/// Get the Vaultkeeper base directory (~/.vaultkeeper).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| {
        ConfigError::Validation("Could not determine home directory".to_string())
    })?;
    Ok(home.join(".vaultkeeper"))
}

/// Get the main config file path (~/.vaultkeeper/vaultkeeper.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("vaultkeeper.json5"))
}

/// Get the default data directory (~/.vaultkeeper/data).
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("data"))
}

/// Get the default integrity ledger directory (~/.vaultkeeper/ledger).
pub fn ledger_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("ledger"))
}

/// Get the default master key file path (~/.vaultkeeper/master.key).
pub fn master_key_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("master.key"))
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
