//! JSON-file-backed durable map.
//!
//! All entries of a namespace live in one JSON object at
//! `{dir}/{namespace}.json`. Every commit rewrites the whole document into a
//! temporary file, syncs it, and renames it over the old one, so a crash
//! leaves either the previous or the new state on disk.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{apply_edits, DurableMap, MapEdit};
use crate::error::{Result, StorageError};

/// [`DurableMap`] persisted as a single JSON file.
pub struct FileMap {
    dir: PathBuf,
    namespace: String,
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileMap {
    /// Open the map for `namespace` under `dir`. The file is created lazily.
    pub fn new(dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        let dir = dir.into();
        let namespace = namespace.into();
        let path = dir.join(format!("{namespace}.json"));
        Self {
            dir,
            namespace,
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&data).map_err(|e| {
            StorageError::Storage(format!("{} is not a valid map: {e}", self.path.display()))
        })
    }

    /// Ensure the directory exists with restrictive permissions.
    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o700);
            tokio::fs::set_permissions(&self.dir, perms).await?;
        }

        Ok(())
    }

    async fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        self.ensure_dir().await?;
        let json = serde_json::to_vec_pretty(entries)?;
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&json).await?;
        file.sync_all().await?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&temp_path, perms).await?;
        }

        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    /// Read-modify-write of the whole document. Caller holds `write_lock`.
    async fn rewrite(&self, edits: Vec<MapEdit>) -> Result<()> {
        let mut entries = self.read_entries().await?;
        apply_edits(&mut entries, edits);
        self.write_entries(&entries).await
    }
}

#[async_trait]
impl DurableMap for FileMap {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries().await?.remove(key))
    }

    async fn get_all(&self) -> Result<BTreeMap<String, String>> {
        self.read_entries().await
    }

    async fn commit(&self, edits: Vec<MapEdit>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let count = edits.len();
        self.rewrite(edits).await.map_err(|e| match e {
            StorageError::Io(io) => StorageError::Storage(format!(
                "commit to {} failed: {io}",
                self.path.display()
            )),
            other => other,
        })?;
        debug!(namespace = %self.namespace, edits = count, "committed map edits");
        Ok(())
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
