//! Key pair lifecycle on top of a [`KeyVault`].
//!
//! The manager decides whether the pair under an alias is usable, generates
//! a fresh one when it is not, and routes private-key decryption through the
//! vault so key material never reaches the storage layer.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::cipher::ChunkedCipher;
use crate::error::{Result, StorageError};
use crate::platform::PlatformCapabilities;
use crate::vault::{
    KeyCertificate, KeyDigest, KeyGenSpec, KeyPadding, KeyPurpose, KeyVault, SecurityLevel,
    Validity, CERTIFICATE_SERIAL,
};

/// Suffix appended to the application id to form the key alias.
pub const ALIAS_SUFFIX: &str = "_cap_sec";

/// Name of one key pair inside the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyAlias(String);

impl KeyAlias {
    /// Use `alias` verbatim.
    pub fn new(alias: impl Into<String>) -> Self {
        Self(alias.into())
    }

    /// The alias for an application: `<app_id>_cap_sec`.
    pub fn for_app(app_id: &str) -> Self {
        Self(format!("{app_id}{ALIAS_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of [`KeyVaultManager::ensure_key_pair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPairStatus {
    /// A usable pair exists under the alias.
    Ready,
    /// The vault could not provide a pair; use the basic strategy.
    Unavailable,
}

/// Creates, validates and uses the key pair behind one alias.
#[derive(Clone)]
pub struct KeyVaultManager {
    vault: Arc<dyn KeyVault>,
    capabilities: PlatformCapabilities,
    key_bits: usize,
}

impl KeyVaultManager {
    pub fn new(vault: Arc<dyn KeyVault>, capabilities: PlatformCapabilities, key_bits: usize) -> Self {
        Self {
            vault,
            capabilities,
            key_bits,
        }
    }

    /// Modulus size used for new pairs and for chunking.
    pub fn key_bits(&self) -> usize {
        self.key_bits
    }

    /// Name of the underlying vault backend.
    pub fn vault_name(&self) -> &'static str {
        self.vault.name()
    }

    /// Make sure a usable pair exists under `alias`, generating one if not.
    ///
    /// A pair is usable when the vault holds a private key for the alias and
    /// a certificate whose public key decodes. Anything else, including a
    /// half-present pair, triggers regeneration. Vault errors never escape:
    /// they are logged and reported as [`KeyPairStatus::Unavailable`].
    pub fn ensure_key_pair(&self, alias: &KeyAlias) -> KeyPairStatus {
        match self.existing_pair(alias) {
            Ok(Some(cert)) => {
                if !cert.validity.contains(Utc::now()) {
                    warn!(%alias, not_after = %cert.validity.not_after, "key pair is outside its validity window");
                }
                debug!(%alias, vault = self.vault.name(), "key pair already present");
                return KeyPairStatus::Ready;
            }
            Ok(None) => {}
            Err(e) => {
                error!(%alias, vault = self.vault.name(), "error retrieving key pair from vault: {e}");
                return KeyPairStatus::Unavailable;
            }
        }

        let spec = self.generation_spec(alias);
        if let Err(e) = self.vault.generate_key_pair(&spec) {
            error!(%alias, vault = self.vault.name(), "error creating key pair: {e}");
            return KeyPairStatus::Unavailable;
        }

        self.log_security_level(alias);
        KeyPairStatus::Ready
    }

    /// Public key for `alias`.
    pub fn public_key(&self, alias: &KeyAlias) -> Result<RsaPublicKey> {
        self.vault
            .certificate_public_key(alias)?
            .ok_or_else(|| StorageError::KeyNotFound(alias.to_string()))
    }

    /// Certificate for `alias`, if present.
    pub fn certificate(&self, alias: &KeyAlias) -> Result<Option<KeyCertificate>> {
        self.vault.certificate(alias)
    }

    /// Decrypt a chunked ciphertext with the private key behind `alias`.
    pub fn decrypt_with_private_key(&self, alias: &KeyAlias, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let handle = self
            .vault
            .key_handle(alias)?
            .ok_or_else(|| StorageError::KeyNotFound(alias.to_string()))?;
        self.vault
            .decrypt_chunked(&handle, &ChunkedCipher::new(self.key_bits), ciphertext)
    }

    /// Remove the pair under `alias` from the vault.
    ///
    /// Entries encrypted under the old pair become unreadable.
    pub fn delete_key_pair(&self, alias: &KeyAlias) -> Result<()> {
        warn!(%alias, vault = self.vault.name(), "deleting key pair");
        self.vault.delete_entry(alias)
    }

    fn existing_pair(&self, alias: &KeyAlias) -> Result<Option<KeyCertificate>> {
        self.vault.load()?;
        if self.vault.key_handle(alias)?.is_none() {
            return Ok(None);
        }
        Ok(self
            .vault
            .certificate(alias)?
            .filter(|cert| cert.public_key().is_some()))
    }

    fn generation_spec(&self, alias: &KeyAlias) -> KeyGenSpec {
        let validity = Validity::ten_years_from(Utc::now());
        if self.capabilities.fine_grained_key_params {
            KeyGenSpec::Parameterized {
                alias: alias.clone(),
                purpose: KeyPurpose::Decrypt,
                digests: vec![KeyDigest::Sha256, KeyDigest::Sha512],
                padding: KeyPadding::Pkcs1,
                key_bits: self.key_bits,
                validity,
            }
        } else {
            KeyGenSpec::CertificateOnly {
                alias: alias.clone(),
                subject: format!("CN={alias}"),
                serial: CERTIFICATE_SERIAL,
                key_bits: self.key_bits,
                validity,
            }
        }
    }

    /// Informational only; failures here never affect the outcome.
    fn log_security_level(&self, alias: &KeyAlias) {
        let level = self
            .vault
            .key_handle(alias)
            .ok()
            .flatten()
            .and_then(|handle| self.vault.security_level(&handle).ok());
        let hardware = matches!(level, Some(SecurityLevel::Hardware));
        debug!(%alias, hardware, "hardware-backed vault check");
    }
}
