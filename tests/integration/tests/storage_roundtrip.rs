//! End-to-end storage tests against the file-backed map and vault.

use std::sync::Arc;

use capsec_core::config::VaultBackend;
use capsec_integration_tests::config_in;
use capsec_storage::map::encode_blob;
use capsec_storage::{
    DurableMap, FileMap, SecureStorage, SecureStoragePlugin, StorageError, StorageStrategy,
};
use tempfile::TempDir;

#[tokio::test]
async fn test_strong_values_survive_reopen() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path(), VaultBackend::Software);

    let storage = SecureStorage::open(&config).unwrap();
    assert_eq!(storage.strategy(), Some(StorageStrategy::Strong));
    let fingerprint = storage.certificate().unwrap().unwrap().fingerprint();

    let secret = vec![0x5a; 600];
    storage.set_data("token", Some(&secret)).await.unwrap();
    drop(storage);

    // The raw file holds ciphertext, never the plaintext.
    let raw = FileMap::new(tmp.path().join("data"), "cap_sec");
    let blob = raw.get("token").await.unwrap().unwrap();
    assert_ne!(blob, encode_blob(&secret));

    let reopened = SecureStorage::open(&config).unwrap();
    assert_eq!(
        reopened.certificate().unwrap().unwrap().fingerprint(),
        fingerprint
    );
    assert_eq!(reopened.get_data("token").await.unwrap(), Some(secret));
}

#[tokio::test]
async fn test_disabled_vault_uses_basic_encoding() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path(), VaultBackend::Disabled);

    let storage = SecureStorage::open(&config).unwrap();
    assert_eq!(storage.strategy(), Some(StorageStrategy::Basic));
    assert!(storage.vault_name().is_none());

    storage.set_data("plain", Some(b"visible")).await.unwrap();

    let raw = FileMap::new(tmp.path().join("data"), "cap_sec");
    assert_eq!(
        raw.get("plain").await.unwrap(),
        Some(encode_blob(b"visible"))
    );
    assert!(!tmp.path().join("vault").exists());
}

#[tokio::test]
async fn test_legacy_entries_move_on_read() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(tmp.path(), VaultBackend::Disabled);
    config.storage.legacy_namespace = Some("old_store".into());

    let legacy: Arc<dyn DurableMap> = Arc::new(FileMap::new(tmp.path().join("data"), "old_store"));
    legacy
        .edit()
        .put("carried", encode_blob(b"from before"))
        .commit()
        .await
        .unwrap();

    let plugin = SecureStoragePlugin::new(SecureStorage::open(&config).unwrap());
    assert_eq!(
        plugin.get("carried").await.unwrap().expose_secret(),
        "from before"
    );

    assert!(legacy.get("carried").await.unwrap().is_none());
    assert_eq!(plugin.keys().await.unwrap(), vec!["carried"]);
}

#[tokio::test]
async fn test_clear_keeps_key_pair() {
    let tmp = TempDir::new().unwrap();
    let config = config_in(tmp.path(), VaultBackend::Software);

    let plugin = SecureStoragePlugin::new(SecureStorage::open(&config).unwrap());
    plugin.set("a", "1").await.unwrap();
    plugin.set("b", "2").await.unwrap();
    assert!(plugin.clear().await.unwrap());
    assert!(plugin.keys().await.unwrap().is_empty());

    let vault_files = std::fs::read_dir(tmp.path().join("vault")).unwrap().count();
    assert!(vault_files >= 2);

    // Same key pair after reopening, and the store is usable again.
    let plugin = SecureStoragePlugin::new(SecureStorage::open(&config).unwrap());
    plugin.set("c", "3").await.unwrap();
    assert_eq!(plugin.get("c").await.unwrap().expose_secret(), "3");
}

#[tokio::test]
async fn test_remove_finds_entry_only_in_legacy_namespace() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(tmp.path(), VaultBackend::Disabled);
    config.storage.legacy_namespace = Some("old_store".into());

    let legacy: Arc<dyn DurableMap> = Arc::new(FileMap::new(tmp.path().join("data"), "old_store"));
    legacy
        .edit()
        .put("pin", encode_blob(b"1234"))
        .commit()
        .await
        .unwrap();

    let plugin = SecureStoragePlugin::new(SecureStorage::open(&config).unwrap());
    assert!(plugin.remove("pin").await.unwrap());

    assert!(legacy.get("pin").await.unwrap().is_none());
    assert!(matches!(
        plugin.get("pin").await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_app_id_unusable_as_vault_name_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut config = config_in(tmp.path(), VaultBackend::Software);
    config.storage.app_id = "my app".into();

    assert!(matches!(
        SecureStorage::open(&config),
        Err(StorageError::Config(_))
    ));
}
