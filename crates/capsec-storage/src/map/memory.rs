//! In-process map, lost when dropped.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{apply_edits, DurableMap, MapEdit};
use crate::error::Result;

/// [`DurableMap`] kept entirely in memory.
pub struct MemoryMap {
    namespace: String,
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryMap {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

#[async_trait]
impl DurableMap for MemoryMap {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn get_all(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.entries.read().await.clone())
    }

    async fn commit(&self, edits: Vec<MapEdit>) -> Result<()> {
        apply_edits(&mut *self.entries.write().await, edits);
        Ok(())
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
