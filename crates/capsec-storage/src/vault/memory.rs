//! Process-local vault. Keys vanish with the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use rsa::RsaPrivateKey;
use tracing::debug;

use super::{
    decrypt_block, generate_private_key, KeyCertificate, KeyGenSpec, KeyHandle, KeyVault,
};
use crate::error::{Result, StorageError};
use crate::keys::KeyAlias;

struct Entry {
    private_key: RsaPrivateKey,
    certificate: KeyCertificate,
}

/// In-memory [`KeyVault`].
#[derive(Default)]
pub struct MemoryVault {
    entries: Mutex<HashMap<KeyAlias, Entry>>,
}

impl MemoryVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an existing private key under `spec.alias()`.
    ///
    /// Lets tests share one pre-generated key instead of paying for RSA key
    /// generation in every case.
    pub fn insert_key_pair(&self, spec: &KeyGenSpec, private_key: RsaPrivateKey) -> Result<()> {
        let certificate = KeyCertificate::issue(spec, &private_key)?;
        self.lock()?.insert(
            spec.alias().clone(),
            Entry {
                private_key,
                certificate,
            },
        );
        Ok(())
    }

    /// Drop only the certificate half of a pair, as a partially corrupted
    /// key store would.
    pub fn forget_certificate(&self, alias: &KeyAlias) -> Result<()> {
        if let Some(entry) = self.lock()?.get_mut(alias) {
            entry.certificate.public_key_pem.clear();
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<KeyAlias, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Vault("memory vault lock poisoned".to_string()))
    }
}

impl KeyVault for MemoryVault {
    fn load(&self) -> Result<()> {
        Ok(())
    }

    fn key_handle(&self, alias: &KeyAlias) -> Result<Option<KeyHandle>> {
        Ok(self
            .lock()?
            .contains_key(alias)
            .then(|| KeyHandle::new(alias.clone())))
    }

    fn certificate(&self, alias: &KeyAlias) -> Result<Option<KeyCertificate>> {
        Ok(self.lock()?.get(alias).map(|e| e.certificate.clone()))
    }

    fn generate_key_pair(&self, spec: &KeyGenSpec) -> Result<()> {
        debug!(alias = %spec.alias(), bits = spec.key_bits(), "generating in-memory key pair");
        let private_key = generate_private_key(spec)?;
        self.insert_key_pair(spec, private_key)
    }

    fn decrypt(&self, handle: &KeyHandle, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let entries = self.lock()?;
        let entry = entries
            .get(handle.alias())
            .ok_or_else(|| StorageError::KeyNotFound(handle.alias().to_string()))?;
        decrypt_block(&entry.private_key, ciphertext)
    }

    fn delete_entry(&self, alias: &KeyAlias) -> Result<()> {
        self.lock()?.remove(alias);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
