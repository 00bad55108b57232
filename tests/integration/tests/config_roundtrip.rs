//! Config save/load roundtrip integration tests.
//!
//! These tests verify that configuration can be serialized, written to disk,
//! and loaded back with identical field values.

use std::path::Path;
use tempfile::TempDir;
use vaultkeeper_core::VaultConfig;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");

    let config = VaultConfig::default();
    config.save(&path).unwrap();

    let loaded = VaultConfig::load(&path).unwrap();
    assert_eq!(loaded.crypto.kdf_iterations, config.crypto.kdf_iterations);
    assert_eq!(loaded.master_key.env_var, config.master_key.env_var);
    assert_eq!(loaded.events.capacity, config.events.capacity);
    assert_eq!(loaded.limits.max_tags, config.limits.max_tags);
    loaded.validate().unwrap();
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json5");

    let mut config = VaultConfig::default();
    config.crypto.kdf_iterations = 300_000;
    config.integrity.enabled = true;
    config.storage.data_dir = Some(dir.path().join("data"));
    config.save(&path).unwrap();

    let loaded = VaultConfig::load(&path).unwrap();
    assert_eq!(loaded.crypto.kdf_iterations, 300_000);
    assert!(loaded.integrity.enabled);
    assert_eq!(loaded.data_dir().unwrap(), dir.path().join("data"));
}

#[test]
fn test_config_load_nonexistent() {
    let result = VaultConfig::load(Path::new("/nonexistent/config.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = VaultConfig::parse("not valid json");
    assert!(result.is_err());
}

#[test]
fn test_config_json5_comments_and_partial() {
    let config = VaultConfig::parse(
        r#"{
            // only override what matters
            crypto: { kdf_iterations: 200000 },
            limits: { max_tags: 5, },
        }"#,
    )
    .unwrap();
    assert_eq!(config.crypto.kdf_iterations, 200_000);
    assert_eq!(config.limits.max_tags, 5);
    assert_eq!(
        config.limits.max_name_len,
        VaultConfig::default().limits.max_name_len
    );
}

#[test]
fn test_config_rejects_weak_kdf() {
    let mut config = VaultConfig::default();
    config.crypto.kdf_iterations = 10;
    assert!(config.validate().is_err());
}
