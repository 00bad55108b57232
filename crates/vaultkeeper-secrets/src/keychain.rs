//! Master key resolution.
//!
//! The master key is resolved in priority order:
//! 1. The configured environment variable (hex-encoded, default `VAULTKEEPER_MASTER_KEY`)
//! 2. OS keychain (macOS Keychain via Security.framework)
//! 3. A key file (hex-encoded, default `~/.vaultkeeper/master.key`)
//! 4. A freshly generated ephemeral key, if the config allows it
//!
//! On platforms without keychain support step 2 is skipped.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use vaultkeeper_core::config::MasterKeyConfig;
use vaultkeeper_core::{env, paths};
use zeroize::Zeroizing;

use crate::crypto::MasterKey;
use crate::error::{Result, SecretError};

#[cfg(target_os = "macos")]
const SERVICE_NAME: &str = "vaultkeeper";
#[cfg(target_os = "macos")]
const ACCOUNT_NAME: &str = "master_key";

/// Where a resolved master key came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MasterKeySource {
    Env(String),
    Keychain,
    File(PathBuf),
    Ephemeral,
}

impl std::fmt::Display for MasterKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MasterKeySource::Env(var) => write!(f, "env:{var}"),
            MasterKeySource::Keychain => f.write_str("keychain"),
            MasterKeySource::File(path) => write!(f, "file:{}", path.display()),
            MasterKeySource::Ephemeral => f.write_str("ephemeral"),
        }
    }
}

/// Resolve the master key according to `config`.
pub fn load_master_key(config: &MasterKeyConfig) -> Result<(MasterKey, MasterKeySource)> {
    if let Some(hex_key) = env::get_var(&config.env_var) {
        debug!(var = %config.env_var, "using master key from environment variable");
        let key = decode_hex_key(&hex_key, &config.env_var)?;
        return Ok((key, MasterKeySource::Env(config.env_var.clone())));
    }

    if let Some(key) = get_from_keychain()? {
        debug!("using master key from OS keychain");
        return Ok((key, MasterKeySource::Keychain));
    }

    let key_file = match &config.key_file {
        Some(path) => Some(path.clone()),
        None => paths::master_key_file().ok(),
    };
    if let Some(path) = key_file.filter(|p| p.exists()) {
        let key = read_key_file(&path)?;
        debug!(path = %path.display(), "using master key from key file");
        return Ok((key, MasterKeySource::File(path)));
    }

    if !config.allow_ephemeral {
        return Err(SecretError::KeySource(format!(
            "no master key found; set {} or run `vaultkeeper keygen`",
            config.env_var
        )));
    }

    let key = MasterKey::generate();
    warn!(
        fingerprint = %key.fingerprint(),
        "no master key configured; using an ephemeral key. \
         Secrets written in this process cannot be decrypted after it exits"
    );
    Ok((key, MasterKeySource::Ephemeral))
}

/// Read a hex-encoded key file.
pub fn read_key_file(path: &Path) -> Result<MasterKey> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
        if mode & 0o077 != 0 {
            warn!(
                path = %path.display(),
                mode = format!("{mode:o}"),
                "master key file is readable by other users; expected 0600"
            );
        }
    }

    let contents = Zeroizing::new(std::fs::read_to_string(path)?);
    decode_hex_key(&contents, &path.display().to_string())
}

/// Write `key` as hex to `path` with mode `0600`.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn write_key_file(path: &Path, key: &MasterKey, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(SecretError::KeySource(format!(
            "{} already exists; refusing to overwrite",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let encoded = Zeroizing::new(hex::encode(key.expose()));
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, encoded.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;
    debug!(path = %path.display(), fingerprint = %key.fingerprint(), "wrote master key file");
    Ok(())
}

fn decode_hex_key(hex_key: &str, source: &str) -> Result<MasterKey> {
    let bytes = Zeroizing::new(
        hex::decode(hex_key.trim())
            .map_err(|e| SecretError::KeySource(format!("invalid hex in {source}: {e}")))?,
    );
    MasterKey::from_bytes(&bytes)
        .map_err(|_| SecretError::KeySource(format!("{source} must decode to exactly 32 bytes")))
}

/// Store the master key in the OS keychain.
#[cfg(target_os = "macos")]
pub fn store_in_keychain(key: &MasterKey) -> Result<()> {
    use security_framework::passwords::set_generic_password;

    let hex_key = Zeroizing::new(hex::encode(key.expose()));
    set_generic_password(SERVICE_NAME, ACCOUNT_NAME, hex_key.as_bytes())
        .map_err(|e| SecretError::KeySource(format!("keychain write failed: {e}")))
}

#[cfg(not(target_os = "macos"))]
pub fn store_in_keychain(_key: &MasterKey) -> Result<()> {
    Err(SecretError::KeySource(
        "OS keychain not available on this platform; use a key file".into(),
    ))
}

#[cfg(target_os = "macos")]
fn get_from_keychain() -> Result<Option<MasterKey>> {
    use security_framework::passwords::get_generic_password;

    match get_generic_password(SERVICE_NAME, ACCOUNT_NAME) {
        Ok(data) => {
            let hex_str = Zeroizing::new(String::from_utf8(data.to_vec()).map_err(|e| {
                SecretError::KeySource(format!("keychain data is not valid UTF-8: {e}"))
            })?);
            decode_hex_key(&hex_str, "keychain").map(Some)
        }
        Err(e) => {
            // errSecItemNotFound
            let msg = e.to_string();
            if msg.contains("not found") || msg.contains("-25300") {
                Ok(None)
            } else {
                Err(SecretError::KeySource(format!("keychain read failed: {e}")))
            }
        }
    }
}

#[cfg(not(target_os = "macos"))]
fn get_from_keychain() -> Result<Option<MasterKey>> {
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(env_var: &str, key_file: Option<PathBuf>, allow_ephemeral: bool) -> MasterKeyConfig {
        MasterKeyConfig {
            env_var: env_var.to_string(),
            key_file,
            allow_ephemeral,
        }
    }

    #[test]
    fn test_master_key_from_env_var() {
        let key = MasterKey::generate();
        std::env::set_var("VK_TEST_MK_ENV", hex::encode(key.expose()));

        let (loaded, source) = load_master_key(&config("VK_TEST_MK_ENV", None, false)).unwrap();
        assert_eq!(loaded.fingerprint(), key.fingerprint());
        assert_eq!(source, MasterKeySource::Env("VK_TEST_MK_ENV".into()));

        std::env::remove_var("VK_TEST_MK_ENV");
    }

    #[test]
    fn test_invalid_hex_in_env_var() {
        std::env::set_var("VK_TEST_MK_BAD_HEX", "not-valid-hex!");
        let result = load_master_key(&config("VK_TEST_MK_BAD_HEX", None, true));
        assert!(matches!(result, Err(SecretError::KeySource(_))));
        std::env::remove_var("VK_TEST_MK_BAD_HEX");
    }

    #[test]
    fn test_wrong_length_key_in_env_var() {
        std::env::set_var("VK_TEST_MK_SHORT", hex::encode([0u8; 16]));
        let result = load_master_key(&config("VK_TEST_MK_SHORT", None, true));
        assert!(result.is_err());
        std::env::remove_var("VK_TEST_MK_SHORT");
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_key_file_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("master.key");
        let key = MasterKey::generate();
        write_key_file(&path, &key, false).unwrap();

        let (loaded, source) =
            load_master_key(&config("VK_TEST_MK_UNSET_FILE", Some(path.clone()), false)).unwrap();
        assert_eq!(loaded.fingerprint(), key.fingerprint());
        assert_eq!(source, MasterKeySource::File(path));
    }

    #[test]
    fn test_write_key_file_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("master.key");
        write_key_file(&path, &MasterKey::generate(), false).unwrap();
        assert!(write_key_file(&path, &MasterKey::generate(), false).is_err());
        assert!(write_key_file(&path, &MasterKey::generate(), true).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("master.key");
        write_key_file(&path, &MasterKey::generate(), false).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_missing_key_without_ephemeral_fails() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("absent.key");
        let result = load_master_key(&config("VK_TEST_MK_UNSET_STRICT", Some(missing), false));
        assert!(matches!(result, Err(SecretError::KeySource(_))));
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn test_ephemeral_fallback() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("absent.key");
        let (_, source) =
            load_master_key(&config("VK_TEST_MK_UNSET_EPHEMERAL", Some(missing), true)).unwrap();
        assert_eq!(source, MasterKeySource::Ephemeral);
    }
}
