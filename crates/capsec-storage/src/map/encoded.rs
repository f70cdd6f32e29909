//! Blob-valued view over a [`DurableMap`].

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, info};

use super::DurableMap;
use crate::error::{Result, StorageError};

/// Encode bytes as a stored blob: standard base64 with padding.
pub fn encode_blob(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a stored blob.
///
/// ASCII whitespace is skipped so blobs written by older clients that
/// wrapped base64 at 76 columns still decode.
pub fn decode_blob(key: &str, blob: &str) -> Result<Vec<u8>> {
    let result = if blob.bytes().any(|b| b.is_ascii_whitespace()) {
        let compact: String = blob.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD.decode(compact)
    } else {
        STANDARD.decode(blob)
    };
    result.map_err(|e| StorageError::CorruptEntry {
        key: key.to_string(),
        reason: format!("base64 decode failed: {e}"),
    })
}

/// Durable map of string keys to text blobs.
#[derive(Clone)]
pub struct EncodedMapStore {
    map: Arc<dyn DurableMap>,
    legacy: Option<Arc<dyn DurableMap>>,
}

impl EncodedMapStore {
    pub fn new(map: Arc<dyn DurableMap>) -> Self {
        Self { map, legacy: None }
    }

    /// Also consult `legacy` on reads. An entry found only there is moved
    /// into the primary map before it is returned.
    pub fn with_legacy(mut self, legacy: Arc<dyn DurableMap>) -> Self {
        self.legacy = Some(legacy);
        self
    }

    /// Namespace of the primary map.
    pub fn namespace(&self) -> &str {
        self.map.namespace()
    }

    /// Store `blob` under `key`. `None` leaves the map untouched.
    pub async fn put(&self, key: &str, blob: Option<String>) -> Result<()> {
        let Some(blob) = blob else {
            debug!(key, "ignoring put without a value");
            return Ok(());
        };
        self.map.edit().put(key, blob).commit().await
    }

    /// Blob stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        if let Some(blob) = self.map.get(key).await? {
            return Ok(Some(blob));
        }
        match &self.legacy {
            Some(legacy) => self.migrate_from(legacy.as_ref(), key).await,
            None => Ok(None),
        }
    }

    /// Whether `key` is stored in the primary or the legacy map.
    /// Nothing is migrated.
    pub async fn contains(&self, key: &str) -> Result<bool> {
        if self.map.get(key).await?.is_some() {
            return Ok(true);
        }
        match &self.legacy {
            Some(legacy) => Ok(legacy.get(key).await?.is_some()),
            None => Ok(false),
        }
    }

    /// All keys currently stored in the primary map.
    pub async fn keys(&self) -> Result<BTreeSet<String>> {
        Ok(self.map.get_all().await?.into_keys().collect())
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.map.edit().remove(key).commit().await?;
        if let Some(legacy) = &self.legacy {
            if legacy.get(key).await?.is_some() {
                legacy.edit().remove(key).commit().await?;
            }
        }
        Ok(())
    }

    /// Remove every entry.
    pub async fn clear(&self) -> Result<()> {
        self.map.edit().clear().commit().await?;
        if let Some(legacy) = &self.legacy {
            if !legacy.get_all().await?.is_empty() {
                legacy.edit().clear().commit().await?;
            }
        }
        Ok(())
    }

    async fn migrate_from(&self, legacy: &dyn DurableMap, key: &str) -> Result<Option<String>> {
        let Some(blob) = legacy.get(key).await? else {
            return Ok(None);
        };
        // Write the new copy before dropping the old one.
        self.map.edit().put(key, blob.clone()).commit().await?;
        legacy.edit().remove(key).commit().await?;
        info!(
            key,
            from = legacy.namespace(),
            to = self.map.namespace(),
            "migrated entry from legacy namespace"
        );
        Ok(Some(blob))
    }
}
