//! Configuration loading and persistence.

use super::{VaultConfig, MIN_KDF_ITERATIONS};
use crate::env;
use crate::error::ConfigError;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};

impl VaultConfig {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Load from `path` (or the default path), falling back to defaults when
    /// no file exists. Environment overrides are applied either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let loaded = match path {
            Some(p) => Self::load(p),
            None => Self::load_default(),
        };
        let mut config = match loaded {
            Ok(config) => config,
            Err(ConfigError::NotFound(p)) => {
                tracing::debug!(path = %p.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 has no serializer; plain JSON is valid JSON5
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override selected fields from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Some(iterations) = env::get_u32(env::vars::VAULTKEEPER_KDF_ITERATIONS) {
            self.crypto.kdf_iterations = iterations;
        }
        if let Some(dir) = env::get_var(env::vars::VAULTKEEPER_DATA_DIR) {
            self.storage.data_dir = Some(paths::expand_tilde(&dir));
        }
        if env::get_var(env::vars::VAULTKEEPER_INTEGRITY).is_some() {
            self.integrity.enabled = env::get_bool(env::vars::VAULTKEEPER_INTEGRITY);
        }
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.crypto.kdf_iterations < MIN_KDF_ITERATIONS {
            errors.push(format!(
                "crypto.kdf_iterations must be at least {}, got {}",
                MIN_KDF_ITERATIONS, self.crypto.kdf_iterations
            ));
        }

        if self.master_key.env_var.trim().is_empty() {
            errors.push("master_key.env_var must not be empty".to_string());
        }

        if self.events.capacity == 0 {
            errors.push("events.capacity must be greater than 0".to_string());
        }

        if self.limits.max_tags == 0 {
            errors.push("limits.max_tags must be greater than 0".to_string());
        }
        if self.limits.max_name_len == 0 {
            errors.push("limits.max_name_len must be greater than 0".to_string());
        }
        if self.limits.max_value_bytes == 0 {
            errors.push("limits.max_value_bytes must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Resolved data directory.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::data_dir(),
        }
    }

    /// Resolved ledger directory.
    pub fn ledger_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.integrity.ledger_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::ledger_dir(),
        }
    }
}
