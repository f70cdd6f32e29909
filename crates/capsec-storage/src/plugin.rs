//! String-valued command surface.
//!
//! Mirrors the calls exposed to application code: values are UTF-8 text,
//! successful mutations answer `true`, and reading or removing a key that
//! does not exist is an error rather than an empty result.

use capsec_core::SecretString;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::facade::{SecureStorage, SharedStorage};

/// Text API over a shared [`SecureStorage`].
#[derive(Clone)]
pub struct SecureStoragePlugin {
    storage: SharedStorage,
}

impl SecureStoragePlugin {
    pub fn new(storage: SecureStorage) -> Self {
        Self {
            storage: storage.into_shared(),
        }
    }

    /// Value stored under `key`.
    pub async fn get(&self, key: &str) -> Result<SecretString> {
        let storage = self.storage.lock().await;
        let bytes = storage
            .get_data(key)
            .await?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        SecretString::from_utf8(bytes).map_err(|_| StorageError::InvalidUtf8)
    }

    /// Store `value` under `key`.
    pub async fn set(&self, key: &str, value: &str) -> Result<bool> {
        let storage = self.storage.lock().await;
        storage.set_data(key, Some(value.as_bytes())).await?;
        Ok(true)
    }

    /// Remove `key`, failing if nothing is stored under it.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let storage = self.storage.lock().await;
        if !storage.contains(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        storage.remove(key).await?;
        debug!(key, "removed");
        Ok(true)
    }

    /// Remove every entry.
    pub async fn clear(&self) -> Result<bool> {
        self.storage.lock().await.clear().await?;
        Ok(true)
    }

    /// Stored keys in ascending order.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let keys = self.storage.lock().await.keys().await?;
        Ok(keys.into_iter().collect())
    }

    /// Name of the platform the store runs on.
    pub async fn get_platform(&self) -> String {
        self.storage.lock().await.platform().to_string()
    }
}
