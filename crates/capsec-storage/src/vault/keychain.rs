//! macOS keychain vault.
//!
//! Each pair is stored as two generic passwords under the `capsec` service:
//! `<alias>.key` holds the PKCS#8 PEM private key and `<alias>.cert` the
//! JSON certificate.

use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use security_framework::item::{ItemClass, ItemSearchOptions};
use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{
    decrypt_block, generate_private_key, KeyCertificate, KeyGenSpec, KeyHandle, KeyVault,
};
use crate::cipher::ChunkedCipher;
use crate::error::{Result, StorageError};
use crate::keys::KeyAlias;

const SERVICE_NAME: &str = "capsec";

/// errSecItemNotFound
const ITEM_NOT_FOUND: i32 = -25300;

/// [`KeyVault`] backed by the login keychain.
#[derive(Debug, Default)]
pub struct KeychainVault;

impl KeychainVault {
    pub fn new() -> Self {
        Self
    }

    fn read(account: &str) -> Result<Option<Zeroizing<Vec<u8>>>> {
        match get_generic_password(SERVICE_NAME, account) {
            Ok(data) => Ok(Some(Zeroizing::new(data))),
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(None),
            Err(e) => Err(StorageError::Vault(format!("keychain read failed: {e}"))),
        }
    }

    /// Whether an item exists, without fetching its data.
    fn exists(account: &str) -> Result<bool> {
        let result = ItemSearchOptions::new()
            .class(ItemClass::generic_password())
            .service(SERVICE_NAME)
            .account(account)
            .load_attributes(true)
            .search();
        match result {
            Ok(items) => Ok(!items.is_empty()),
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(false),
            Err(e) => Err(StorageError::Vault(format!("keychain lookup failed: {e}"))),
        }
    }

    fn private_key(alias: &KeyAlias) -> Result<RsaPrivateKey> {
        let data = Self::read(&key_account(alias))?
            .ok_or_else(|| StorageError::KeyNotFound(alias.to_string()))?;
        let pem = std::str::from_utf8(&data)
            .map_err(|e| StorageError::Vault(format!("keychain key is not UTF-8: {e}")))?;
        RsaPrivateKey::from_pkcs8_pem(pem)
            .map_err(|e| StorageError::Vault(format!("unreadable private key for {alias}: {e}")))
    }

    fn write(account: &str, data: &[u8]) -> Result<()> {
        set_generic_password(SERVICE_NAME, account, data)
            .map_err(|e| StorageError::Vault(format!("keychain write failed: {e}")))
    }

    fn delete(account: &str) -> Result<()> {
        match delete_generic_password(SERVICE_NAME, account) {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ITEM_NOT_FOUND => Ok(()),
            Err(e) => Err(StorageError::Vault(format!("keychain delete failed: {e}"))),
        }
    }
}

fn key_account(alias: &KeyAlias) -> String {
    format!("{alias}.key")
}

fn cert_account(alias: &KeyAlias) -> String {
    format!("{alias}.cert")
}

impl KeyVault for KeychainVault {
    fn load(&self) -> Result<()> {
        Ok(())
    }

    fn key_handle(&self, alias: &KeyAlias) -> Result<Option<KeyHandle>> {
        Ok(Self::exists(&key_account(alias))?.then(|| KeyHandle::new(alias.clone())))
    }

    fn certificate(&self, alias: &KeyAlias) -> Result<Option<KeyCertificate>> {
        let Some(data) = Self::read(&cert_account(alias))? else {
            return Ok(None);
        };
        match serde_json::from_slice(&data) {
            Ok(cert) => Ok(Some(cert)),
            Err(e) => {
                warn!(%alias, "ignoring malformed keychain certificate: {e}");
                Ok(None)
            }
        }
    }

    fn generate_key_pair(&self, spec: &KeyGenSpec) -> Result<()> {
        let alias = spec.alias();
        debug!(%alias, bits = spec.key_bits(), "generating keychain key pair");

        let private_key = generate_private_key(spec)?;
        let certificate = KeyCertificate::issue(spec, &private_key)?;
        let pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| StorageError::Vault(format!("private key encoding failed: {e}")))?;

        Self::write(&key_account(alias), pem.as_bytes())?;
        Self::write(&cert_account(alias), &serde_json::to_vec(&certificate)?)
    }

    fn decrypt(&self, handle: &KeyHandle, ciphertext: &[u8]) -> Result<Vec<u8>> {
        decrypt_block(&Self::private_key(handle.alias())?, ciphertext)
    }

    fn decrypt_chunked(
        &self,
        handle: &KeyHandle,
        cipher: &ChunkedCipher,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let private_key = Self::private_key(handle.alias())?;
        cipher.decrypt(ciphertext, |block| decrypt_block(&private_key, block))
    }

    fn delete_entry(&self, alias: &KeyAlias) -> Result<()> {
        Self::delete(&cert_account(alias))?;
        Self::delete(&key_account(alias))
    }

    fn name(&self) -> &'static str {
        "keychain"
    }
}
