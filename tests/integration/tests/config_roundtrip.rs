//! Config save/load roundtrip integration tests.

use capsec_core::config::VaultBackend;
use capsec_core::Config;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capsec.json5");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.storage.namespace, config.storage.namespace);
    assert_eq!(loaded.storage.app_id, config.storage.app_id);
    assert_eq!(loaded.vault.backend, config.vault.backend);
    assert_eq!(loaded.vault.key_bits, config.vault.key_bits);
    assert!(loaded.storage.compat.silent_missing_key);
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capsec.json5");

    let mut config = Config::default();
    config.vault.backend = VaultBackend::Software;
    config.vault.key_bits = 3072;
    config.storage.legacy_namespace = Some("old_store".into());
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.vault.backend, VaultBackend::Software);
    assert_eq!(loaded.vault.key_bits, 3072);
    assert_eq!(loaded.storage.legacy_namespace.as_deref(), Some("old_store"));
}

#[test]
fn test_config_accepts_json5_syntax() {
    let config = Config::parse(
        r#"{
            // trailing commas and comments are fine
            storage: { app_id: 'com.example.app', },
            vault: { backend: 'disabled' },
        }"#,
    )
    .unwrap();

    assert_eq!(config.storage.app_id, "com.example.app");
    assert_eq!(config.storage.namespace, "cap_sec");
    assert_eq!(config.vault.backend, VaultBackend::Disabled);
}

#[test]
fn test_config_load_nonexistent() {
    let result = Config::load(Path::new("/nonexistent/capsec.json5"));
    assert!(result.is_err());
}

#[test]
fn test_config_parse_invalid() {
    let result = Config::parse("not valid json");
    assert!(result.is_err());
}
