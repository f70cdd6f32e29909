//! Durable string maps.
//!
//! [`DurableMap`] is the platform's persistent string-to-string storage.
//! Writes are grouped into a batch with [`MapEditor`] and only count once
//! [`MapEditor::commit`] returns `Ok`. [`EncodedMapStore`] layers the blob
//! semantics used by the storage strategies on top.

mod encoded;
mod file;
mod memory;

pub use encoded::{decode_blob, encode_blob, EncodedMapStore};
pub use file::FileMap;
pub use memory::MemoryMap;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;

/// One change inside a commit batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEdit {
    Put { key: String, value: String },
    Remove { key: String },
    Clear,
}

/// Apply a batch of edits, in order, to an in-memory snapshot.
pub(crate) fn apply_edits(entries: &mut BTreeMap<String, String>, edits: Vec<MapEdit>) {
    for edit in edits {
        match edit {
            MapEdit::Put { key, value } => {
                entries.insert(key, value);
            }
            MapEdit::Remove { key } => {
                entries.remove(&key);
            }
            MapEdit::Clear => entries.clear(),
        }
    }
}

/// Persistent string map identified by a namespace.
#[async_trait]
pub trait DurableMap: Send + Sync {
    /// Value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Snapshot of every entry.
    async fn get_all(&self) -> Result<BTreeMap<String, String>>;

    /// Apply `edits` in order and persist them before returning.
    async fn commit(&self, edits: Vec<MapEdit>) -> Result<()>;

    /// Namespace the map was opened with.
    fn namespace(&self) -> &str;
}

impl<'m> dyn DurableMap + 'm {
    /// Start a batch of edits.
    pub fn edit(&self) -> MapEditor<'_> {
        MapEditor {
            map: self,
            edits: Vec::new(),
        }
    }
}

/// Batch of pending edits against one map.
#[must_use = "edits are discarded unless committed"]
pub struct MapEditor<'a> {
    map: &'a dyn DurableMap,
    edits: Vec<MapEdit>,
}

impl MapEditor<'_> {
    pub fn put(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.edits.push(MapEdit::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.edits.push(MapEdit::Remove { key: key.into() });
        self
    }

    pub fn clear(mut self) -> Self {
        self.edits.push(MapEdit::Clear);
        self
    }

    /// Persist the batch.
    pub async fn commit(self) -> Result<()> {
        if self.edits.is_empty() {
            return Ok(());
        }
        self.map.commit(self.edits).await
    }
}
